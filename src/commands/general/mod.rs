pub mod animal;
pub mod hello;
pub mod poll;
pub mod roll;

use crate::{CommandResult, Context};

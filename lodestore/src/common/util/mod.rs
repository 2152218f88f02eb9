mod date_utils;
mod id_utils;
mod task_util;
mod type_utils;

pub use date_utils::*;
pub use id_utils::*;
pub use task_util::*;
pub use type_utils::*;

use std::sync::{Arc, RwLock};

use crate::error::MinnowError;

/// Shared, lockable ownership of a value. This is the currency of the page
/// cache: pages are handed out as pods so that many transactions can hold
/// the same in-memory page while the lock manager arbitrates access.
pub type Pod<T> = Arc<RwLock<T>>;

pub type ResultPod<T> = Result<Pod<T>, MinnowError>;

pub type MinnowResult = Result<(), MinnowError>;

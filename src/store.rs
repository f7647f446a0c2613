pub(crate) mod fs;
pub(crate) mod kv;
pub(crate) mod redis;

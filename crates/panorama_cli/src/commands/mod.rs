pub(crate) mod import;
pub(crate) mod migrate;
pub(crate) mod shared;
pub(crate) mod status;
pub(crate) mod sync;

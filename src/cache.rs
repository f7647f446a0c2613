pub(crate) mod invalidate;

pub(crate) mod ident_generator;

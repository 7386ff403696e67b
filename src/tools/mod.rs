//! Higher-level analytical tooling built on the data structures and IO
//! layers. Currently hosts the deconvolution engine.

pub mod deconv;

//! Evaluation stack analyses for CIL method bodies
//!
//! The [`cil`] module models method bodies (and builds them from listings or from their binary
//! encoding), while [`analysis`] holds the stack analyses run over them.

pub mod analysis;
pub mod cil;
mod util;

use std::fmt;

/// Any error from materializing or analysing a method body
#[derive(Debug)]
pub enum Error {
    Cil(cil::Error),
    Analysis(analysis::Error),
}

impl From<cil::Error> for Error {
    fn from(err: cil::Error) -> Error {
        Error::Cil(err)
    }
}

impl From<analysis::Error> for Error {
    fn from(err: analysis::Error) -> Error {
        Error::Analysis(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Cil(err) => write!(f, "{}", err),
            Error::Analysis(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Error {}

//! Argument checks run before a method touches any argument

use rustsvc_core::utils::string::contains_line_break;
use rustsvc_core::Fault;

/// Per-method argument rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sanitizer {
    pub min_params: usize,
    /// Empty arguments are rejected as well as line breaks
    pub reject_empty: bool,
}

impl Sanitizer {
    pub const fn new(min_params: usize) -> Self {
        Self {
            min_params,
            reject_empty: false,
        }
    }

    pub const fn rejecting_empty(mut self) -> Self {
        self.reject_empty = true;
        self
    }

    /// Injection check first, then the count.
    pub fn check(&self, params: &[String]) -> Result<(), Fault> {
        let bad = params
            .iter()
            .any(|p| contains_line_break(p) || (self.reject_empty && p.is_empty()));
        if bad {
            return Err(Fault::bad_params());
        }

        if params.len() < self.min_params {
            return Err(Fault::need_more_params());
        }

        Ok(())
    }
}

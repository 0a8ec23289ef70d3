use serde::{Deserialize, Serialize};

/// The source-code slice
///
/// Holds the current user-edited model source. The slice does not track
/// history: the only question it answers is whether the text has been edited
/// since the last successful compile, and that flag lives on the model slice
/// (see [`crate::model::ModelState::compile_required`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeState {
    source: String,
}

impl CodeState {
    /// Create the slice from a default source, typically supplied by app config
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Replace the source text
    ///
    /// Returns true unconditionally to signal that a recompile is now
    /// required. The design deliberately does not diff against previously
    /// compiled text, only against "has there been an edit since last
    /// compile", so even a byte-identical replacement counts as an edit.
    pub fn set_source(&mut self, source: impl Into<String>) -> bool {
        self.source = source.into();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_edit_still_requires_recompile() {
        let mut code = CodeState::new("deriv(S) <- -beta * S * I");
        assert!(code.set_source("deriv(S) <- -beta * S * I"));
        assert_eq!(code.source(), "deriv(S) <- -beta * S * I");
    }
}

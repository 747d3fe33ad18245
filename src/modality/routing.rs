//! Name-based selection of the backend that serves a model.

use std::path::Path;

/// Substring test applied to a lowercased model name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamePattern {
    Contains(&'static str),
    AnyOf(&'static [&'static str]),
}

impl NamePattern {
    fn matches(&self, lowered: &str) -> bool {
        match self {
            NamePattern::Contains(needle) => lowered.contains(needle),
            NamePattern::AnyOf(needles) => needles.iter().any(|n| lowered.contains(n)),
        }
    }
}

/// One routing rule. Directory-only rules apply when the name resolves to a
/// directory under the modality's models dir.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route<B> {
    pub pattern: NamePattern,
    pub directory_only: bool,
    pub backend: B,
}

impl<B: Copy> Route<B> {
    pub const fn contains(needle: &'static str, backend: B) -> Self {
        Self {
            pattern: NamePattern::Contains(needle),
            directory_only: false,
            backend,
        }
    }

    pub const fn directory(pattern: NamePattern, backend: B) -> Self {
        Self {
            pattern,
            directory_only: true,
            backend,
        }
    }

    fn matches(&self, lowered: &str, is_dir: bool) -> bool {
        (!self.directory_only || is_dir) && self.pattern.matches(lowered)
    }
}

/// Select the backend for `name`. Never fails: names no rule claims go to
/// `fallback`.
pub fn pick_client<B: Copy>(
    routes: &[Route<B>],
    fallback: B,
    name: &str,
    models_dir: Option<&Path>,
) -> B {
    let lowered = name.to_lowercase();
    let is_dir = !name.is_empty() && models_dir.map_or(false, |dir| dir.join(name).is_dir());

    routes
        .iter()
        .find(|route| route.matches(&lowered, is_dir))
        .map_or(fallback, |route| route.backend)
}

// src/loader/resolve.rs

use std::path::Path;

use url::Url;

use crate::errors::{HotError, Result};
use crate::types::{split_search, ModuleId};
use crate::watch::path_utils::absolutize;

/// Maps a specifier, as written by a module, to the location of the module
/// it names.
///
/// The returned string may carry a `?search`; the engine strips it to form
/// the identity. Failures propagate to whoever asked for the resolution.
pub trait Resolver: Send + Sync + 'static {
    fn resolve(&self, specifier: &str, referrer: Option<&ModuleId>) -> Result<String>;
}

/// Outcome of an engine-level resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Canonical identity (no query, no version).
    pub id: ModuleId,
    /// Search string of the specifier, leading `?` included (or empty).
    pub search: String,
    /// Key for the loader: identity, search, and the current version stamp.
    pub key: String,
    /// False for excluded (third-party) modules, which are never tracked.
    pub tracked: bool,
}

/// Default resolver for file-backed modules.
///
/// - `file:` URLs and absolute paths are taken as they are.
/// - Relative specifiers resolve against the referrer's URL, or against the
///   current directory when there is no referrer (entry modules).
/// - Any other URL scheme is passed through as an opaque identity.
///
/// Existence is not checked: a module may be resolved before its file is
/// written, and will load once it appears.
#[derive(Debug, Clone, Default)]
pub struct FileResolver;

impl Resolver for FileResolver {
    fn resolve(&self, specifier: &str, referrer: Option<&ModuleId>) -> Result<String> {
        let fail = |reason: &str| HotError::Resolve {
            specifier: specifier.to_string(),
            referrer: referrer
                .map(ModuleId::to_string)
                .unwrap_or_else(|| "<entry>".to_string()),
            reason: reason.to_string(),
        };

        if specifier.is_empty() {
            return Err(fail("empty specifier"));
        }

        // Single-letter schemes are Windows drive letters, not URLs.
        if let Ok(url) = Url::parse(specifier) {
            if url.scheme().len() > 1 {
                return Ok(url.to_string());
            }
        }

        let (base, search) = split_search(specifier);
        let path = Path::new(base);
        if path.is_absolute() {
            let url = Url::from_file_path(absolutize(path))
                .map_err(|_| fail("path is not representable as a file URL"))?;
            return Ok(format!("{url}{search}"));
        }

        match referrer {
            Some(referrer) if referrer.is_file() => {
                let base_url = Url::parse(referrer.as_str())
                    .map_err(|e| fail(&format!("referrer is not a valid URL: {e}")))?;
                let joined = base_url
                    .join(specifier)
                    .map_err(|e| fail(&format!("cannot join onto referrer: {e}")))?;
                Ok(joined.to_string())
            }
            Some(_) => Err(fail("relative specifier from a non-file module")),
            None => {
                let url = Url::from_file_path(absolutize(path))
                    .map_err(|_| fail("path is not representable as a file URL"))?;
                Ok(format!("{url}{search}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn referrer() -> ModuleId {
        ModuleId::new("file:///srv/app/src/main.tiny")
    }

    #[test]
    fn relative_specifiers_follow_the_referrer() {
        let r = FileResolver;
        assert_eq!(
            r.resolve("./dep.tiny", Some(&referrer())).unwrap(),
            "file:///srv/app/src/dep.tiny"
        );
        assert_eq!(
            r.resolve("../lib/util.tiny?raw", Some(&referrer())).unwrap(),
            "file:///srv/app/lib/util.tiny?raw"
        );
    }

    #[test]
    fn absolute_paths_and_urls_pass_through() {
        let r = FileResolver;
        assert_eq!(
            r.resolve("/no/such/hotgraph/x.tiny", Some(&referrer())).unwrap(),
            "file:///no/such/hotgraph/x.tiny"
        );
        assert_eq!(
            r.resolve("file:///srv/other.tiny", None).unwrap(),
            "file:///srv/other.tiny"
        );
        assert_eq!(r.resolve("pkg:left-pad", None).unwrap(), "pkg:left-pad");
    }

    #[test]
    fn relative_from_opaque_referrer_is_an_error() {
        let err = FileResolver
            .resolve("./x.tiny", Some(&ModuleId::new("app:main")))
            .unwrap_err();
        assert!(matches!(err, HotError::Resolve { .. }));
        assert!(FileResolver.resolve("", None).is_err());
    }
}

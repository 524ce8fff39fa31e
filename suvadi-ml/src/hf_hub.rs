use std::path::PathBuf;

use hf_hub::{
    Cache, Repo,
    api::sync::{Api, ApiBuilder},
};
use once_cell::sync::{Lazy, OnceCell};

static CACHE_DIR: OnceCell<PathBuf> = OnceCell::new();

static HF_API: Lazy<Api> = Lazy::new(|| {
    ApiBuilder::new()
        .with_cache_dir(get_cache_dir().to_path_buf())
        .build()
        .expect("build HF API client")
});
static HF_CACHE: Lazy<Cache> = Lazy::new(|| Cache::new(get_cache_dir().to_path_buf()));

fn get_cache_dir() -> &'static PathBuf {
    CACHE_DIR.get_or_init(|| {
        dirs::cache_dir()
            .unwrap_or_default()
            .join("Suvadi")
            .join("models")
    })
}

pub fn set_cache_dir(path: PathBuf) -> anyhow::Result<()> {
    CACHE_DIR
        .set(path)
        .map_err(|_| anyhow::anyhow!("cache dir has already been set"))
}

/// Resolve a model file to a local path. With `check_remote` off, a cached
/// copy is trusted as-is and the Hub is never contacted; otherwise the file
/// is revalidated (and fetched if stale or missing) through the Hub API.
pub fn hf_download(repo: &str, filename: &str, check_remote: bool) -> anyhow::Result<PathBuf> {
    let hf_repo = Repo::model(repo.to_string());
    if !check_remote {
        if let Some(path) = HF_CACHE.repo(hf_repo.clone()).get(filename) {
            return Ok(path);
        }
    }

    let span = tracing::info_span!("hf_download", repo, filename);
    let _enter = span.enter();

    let path = HF_API.repo(hf_repo).get(filename)?;

    Ok(path)
}

#[macro_export]
macro_rules! define_models {
    ($($variant:ident => ($repo:literal, $filename:literal)),* $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum Manifest {
            $($variant,)*
        }

        impl Manifest {
            pub fn source(&self) -> (&'static str, &'static str) {
                match self {
                    $(Self::$variant => ($repo, $filename),)*
                }
            }

            pub fn get(&self, check_remote: bool) -> anyhow::Result<std::path::PathBuf> {
                let (repo, filename) = self.source();
                $crate::hf_hub::hf_download(repo, filename, check_remote)
            }
        }
    };
}

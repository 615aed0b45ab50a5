use minijinja::Environment;
use serde_json::Value as JsonValue;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

/// A file read from under a root directory.
#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    pub mime: &'static str,
    pub modified: SystemTime,
}

/// Read-only view of one directory tree (assets, media, or page templates).
///
/// Every lookup goes through [`StaticFiles::map_path`], which refuses anything but plain
/// relative components, so no request can name a file outside the root.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    base_dir: PathBuf,
}

impl StaticFiles {
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self { base_dir: base.into() }
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolve a relative URL path under the root. `None` for `..`, absolute or prefixed paths.
    #[must_use]
    pub fn map_path(&self, url_path: &str) -> Option<PathBuf> {
        let mut pb = self.base_dir.clone();
        let mut pushed = false;
        for comp in Path::new(url_path.trim_start_matches('/')).components() {
            match comp {
                Component::Normal(s) => {
                    pb.push(s);
                    pushed = true;
                }
                Component::CurDir => {}
                _ => return None,
            }
        }
        pushed.then_some(pb)
    }

    #[must_use]
    pub fn content_type(path: &Path) -> &'static str {
        match path.extension().and_then(|s| s.to_str()).unwrap_or("").to_lowercase().as_str() {
            "html" => "text/html; charset=utf-8",
            "css" => "text/css",
            "js" => "application/javascript",
            "json" => "application/json",
            "txt" => "text/plain; charset=utf-8",
            "ico" => "image/x-icon",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "avif" => "image/avif",
            "svg" => "image/svg+xml",
            "woff" => "font/woff",
            "woff2" => "font/woff2",
            "ttf" => "font/ttf",
            "otf" => "font/otf",
            "mp3" => "audio/mpeg",
            "ogg" => "audio/ogg",
            "mp4" => "video/mp4",
            "webm" => "video/webm",
            "zip" => "application/zip",
            "gz" => "application/gzip",
            _ => "application/octet-stream",
        }
    }

    /// Resolve and stat a file; directories and missing files are `NotFound`.
    pub fn stat(&self, url_path: &str) -> io::Result<(PathBuf, fs::Metadata)> {
        let path = self
            .map_path(url_path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "invalid path"))?;
        let meta = fs::metadata(&path)?;
        if !meta.is_file() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "file not found"));
        }
        Ok((path, meta))
    }

    pub fn load(&self, url_path: &str) -> io::Result<LoadedFile> {
        let (path, meta) = self.stat(url_path)?;
        let bytes = fs::read(&path)?;
        Ok(LoadedFile {
            mime: Self::content_type(&path),
            modified: meta.modified()?,
            bytes,
            path,
        })
    }

    /// Render an HTML template under the root with `ctx`.
    pub fn render(&self, url_path: &str, ctx: &JsonValue) -> io::Result<String> {
        let (path, _) = self.stat(url_path)?;
        let source = fs::read_to_string(&path)?;
        let mut env = Environment::new();
        env.add_template("tpl", &source).map_err(io::Error::other)?;
        let tmpl = env.get_template("tpl").map_err(io::Error::other)?;
        tmpl.render(ctx).map_err(io::Error::other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn root() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("robots.txt"), "User-agent: *\n").unwrap();
        fs::create_dir(dir.path().join("icons")).unwrap();
        fs::write(dir.path().join("icons/like.png"), [0x89, b'P', b'N', b'G']).unwrap();
        fs::write(dir.path().join("about.html"), "<h1>About {{ domain }}</h1>").unwrap();
        dir
    }

    #[test]
    fn test_map_path_prevents_traversal() {
        let sf = StaticFiles::new("/srv/static");
        assert!(sf.map_path("../Cargo.toml").is_none());
        assert!(sf.map_path("icons/../../etc/passwd").is_none());
        assert!(sf.map_path("").is_none());
        assert_eq!(
            sf.map_path("/icons/./like.png"),
            Some(PathBuf::from("/srv/static/icons/like.png"))
        );
    }

    #[test]
    fn test_load_plain_file() {
        let dir = root();
        let sf = StaticFiles::new(dir.path());
        let file = sf.load("robots.txt").unwrap();
        assert_eq!(file.mime, "text/plain; charset=utf-8");
        assert_eq!(file.bytes, b"User-agent: *\n");
        assert_eq!(sf.load("icons/like.png").unwrap().mime, "image/png");
        assert_eq!(sf.load("icons").unwrap_err().kind(), io::ErrorKind::NotFound);
        assert_eq!(sf.load("missing.txt").unwrap_err().kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_render_html() {
        let dir = root();
        let sf = StaticFiles::new(dir.path());
        let html = sf.render("about.html", &json!({ "domain": "social.example" })).unwrap();
        assert_eq!(html, "<h1>About social.example</h1>");
    }
}

//! Static asset host.
//!
//! Serves files from the configured public directory. Missing files, a
//! missing base directory, and paths that try to escape the base directory
//! all answer 404.

use std::path::Path;

use tower_http::services::ServeDir;

/// Build the service that answers every request not claimed by another route.
///
/// Directory requests (including `/`) resolve to `index.html` when present.
pub fn static_service(public_dir: &Path) -> ServeDir {
    ServeDir::new(public_dir).append_index_html_on_directories(true)
}

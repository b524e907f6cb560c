//! Shared fixtures for unit tests.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use mend_core::config::ProjectSettings;

/// Lay out a project tree under `root` that passes every project check.
pub(crate) fn healthy_project(root: &Path) -> Arc<ProjectSettings> {
    for dir in ["dist", "node_modules", "src/components/dashboard", "src/pages"] {
        fs::create_dir_all(root.join(dir)).unwrap();
    }
    for file in ["package.json", "vite.config.js", "tsconfig.json", ".env"] {
        fs::write(root.join(file), "{}").unwrap();
    }
    fs::write(root.join("src/components/dashboard/Dashboard.tsx"), "export {}").unwrap();
    fs::write(root.join("src/pages/Home.tsx"), "export {}").unwrap();
    fs::write(root.join("src/App.tsx"), "<BrowserRouter><Routes/></BrowserRouter>").unwrap();
    Arc::new(ProjectSettings::rooted_at(root))
}

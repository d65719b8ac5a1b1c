mod build_tests;
mod dev_server_tests;
mod purge_tests;

use std::fs;
use std::path::Path;
use tempfile::TempDir;

pub fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A small Hugo-style site: one layout, four style entries, a script graph with one vendor package.
pub fn site_fixture() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    write(
        root,
        "layouts/index.html",
        r#"<html><head><title>Blog</title></head><body><nav class="navbar"><a id="home" class="navbar-item" href="/">Home</a></nav></body></html>"#,
    );
    write(
        root,
        "src/js/app.js",
        "import { mount } from 'tiny-dom';\nimport { toggle } from './toggle';\nmount(toggle);\n",
    );
    write(
        root,
        "src/js/toggle.js",
        "export function toggle(el) { el.classList.add('sidebar-visible'); }\n",
    );
    write(root, "node_modules/tiny-dom/package.json", r#"{"name":"tiny-dom","main":"index.js"}"#);
    write(
        root,
        "node_modules/tiny-dom/index.js",
        "exports.mount = function (fn) { return fn(document.body); };\n",
    );
    write(
        root,
        "src/scss/app.scss",
        r#"
        $brand: #ff0000;
        .navbar { color: $brand; }
        .navbar-item { padding: 1rem; }
        .sidebar-visible { display: block; }
        .unused-widget { display: none; }
        .is-online { color: green; }
        #home { margin: 0; }
        "#,
    );
    write(root, "src/scss/app-dark.scss", "body { background: #000; }\n.unused-dark { color: #fff; }\n");
    write(root, "src/scss/vendor.scss", ".modal { display: none; }\n.navbar { border: 0; }\n");
    write(root, "src/scss/vendor-dark.scss", ".navbar { border-color: #111; }\n");
    write(root, "src/js/inline.js", "window.theme = window.localStorage?.getItem('theme') ?? 'light';\n");
    write(root, "src/images/icons-sprite.svg", r#"<svg xmlns="http://www.w3.org/2000/svg"><symbol id="rss"/></svg>"#);

    dir
}

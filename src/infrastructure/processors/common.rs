use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// `sourceMappingURL` comment carrying the whole map as a data URL.
pub fn inline_source_map_comment(map_json: &str, css: bool) -> String {
    let url = format!(
        "data:application/json;charset=utf-8;base64,{}",
        STANDARD.encode(map_json)
    );

    if css {
        format!("/*# sourceMappingURL={} */", url)
    } else {
        format!("//# sourceMappingURL={}", url)
    }
}

/// Forward-slash path, as used for module ids and manifest keys.
pub fn slash_path(path: &std::path::Path) -> String {
    path.components()
        .filter_map(|c| match c {
            std::path::Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_inline_comment_styles() {
        let css = inline_source_map_comment("{}", true);
        assert_eq!(
            css,
            "/*# sourceMappingURL=data:application/json;charset=utf-8;base64,e30= */"
        );

        let js = inline_source_map_comment("{}", false);
        assert!(js.starts_with("//# sourceMappingURL=data:application/json"));
    }

    #[test]
    fn test_slash_path() {
        assert_eq!(slash_path(Path::new("src/js/app.js")), "src/js/app.js");
        assert_eq!(slash_path(Path::new("./static/build/app.css")), "static/build/app.css");
    }
}

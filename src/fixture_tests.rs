#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use walkdir::WalkDir;

    use crate::parse::AstroParser;
    use crate::safety_tests::{assert_contained, assert_covered};
    use crate::script::ParserOptions;
    use crate::visitor::collect_preorder;

    const FIXTURES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

    fn fixture_files() -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(FIXTURES)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "astro"))
            .map(|e| e.path().to_path_buf())
            .collect();
        files.sort();
        files
    }

    fn read(path: &Path) -> String {
        fs::read_to_string(path).unwrap_or_else(|e| panic!("{}: {}", path.display(), e))
    }

    #[test]
    fn test_fixtures_are_present() {
        assert!(fixture_files().len() >= 5, "fixtures missing under {}", FIXTURES);
    }

    #[test]
    fn test_every_fixture_parses_with_full_coverage() {
        let _ = env_logger::builder().is_test(true).try_init();
        let parser = AstroParser::new();
        for path in fixture_files() {
            let source = read(&path);
            let result = parser
                .parse_for_eslint(&source, &ParserOptions::default())
                .unwrap_or_else(|e| panic!("{}: {}", path.display(), e));
            assert_covered(&source, &result);
            assert_contained(&source, &result);
            assert_eq!(result.ast.kind, "Program", "{}", path.display());
            let root = result
                .ast
                .nodes("body")
                .and_then(|body| body.last())
                .and_then(|stmt| stmt.as_ref())
                .and_then(|stmt| stmt.node("expression"))
                .map(|expr| expr.kind.as_str());
            assert_eq!(root, Some("AstroFragment"), "{}", path.display());
            let json = result.to_estree_json().unwrap();
            assert_eq!(json["services"]["isAstro"], true);
        }
    }

    #[test]
    fn test_fixture_scopes_treat_astro_as_global() {
        let parser = AstroParser::new();
        for path in fixture_files() {
            let source = read(&path);
            let result = parser
                .parse_for_eslint(&source, &ParserOptions::default())
                .unwrap();
            let manager = &result.scope_manager;
            let global = manager.scope(manager.global_scope());
            assert!(
                global.through.iter().all(|r| manager.reference(*r).name != "Astro"),
                "{}: `Astro` leaked through",
                path.display()
            );
        }
    }

    #[test]
    fn test_layout_fixture_shape() {
        let source = read(&Path::new(FIXTURES).join("layout.astro"));
        let result = AstroParser::new()
            .parse_for_eslint(&source, &ParserOptions::default())
            .unwrap();
        let nodes = collect_preorder(&result.ast);
        assert!(nodes.iter().any(|n| n.kind == "TSInterfaceDeclaration"));
        assert_eq!(nodes.iter().filter(|n| n.kind == "AstroDoctype").count(), 1);
        let names: Vec<_> = nodes
            .iter()
            .filter(|n| n.kind == "JSXOpeningElement")
            .filter_map(|n| n.node("name").and_then(|name| name.str_field("name")))
            .collect();
        assert_eq!(names, vec!["html", "head", "meta", "title", "body", "slot"]);
    }
}

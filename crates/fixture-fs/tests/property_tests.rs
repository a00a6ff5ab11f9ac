use fixture_fs::RelativePath;
use proptest::prelude::*;
use std::path::Path;

proptest! {
    #[test]
    fn accepted_paths_never_escape_root(input in "[a-z./\\\\]{0,24}") {
        if let Ok(path) = RelativePath::new(&input) {
            let root = Path::new("/work");
            prop_assert!(path.to_native_under(root).starts_with(root));
            prop_assert!(!path.as_str().split('/').any(|s| s == ".." || s.is_empty()));
        }
    }

    #[test]
    fn normalization_is_idempotent(input in "[a-z]{1,6}(/[a-z]{1,6}){0,4}") {
        let once = RelativePath::new(&input).unwrap();
        let twice = RelativePath::new(once.as_str()).unwrap();
        prop_assert_eq!(once, twice);
    }
}

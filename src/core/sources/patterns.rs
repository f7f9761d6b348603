// ─── Identifier patterns ───
// Syntactic predicates shared by the sources. Kept in one place so each
// rule can be tested without a source instance.

use std::sync::LazyLock;

use regex::Regex;

/// Modrinth project slug: word characters plus a small punctuation set, 3-64 chars.
pub static MODRINTH_SLUG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^[A-Za-z0-9_!@$()`.+,"'\-]{3,64}$"#).expect("unable to compile modrinth slug regex")
});

/// GitHub user/organisation: alphanumeric runs joined by single hyphens.
/// Length (1-39) is checked separately.
pub static GITHUB_OWNER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]+(?:-[A-Za-z0-9]+)*$").expect("unable to compile github owner regex")
});

/// GitHub repository name.
pub static GITHUB_REPO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("unable to compile github repo regex")
});

const GITHUB_OWNER_MAX_LEN: usize = 39;

/// Extension a release asset must carry to be picked without an explicit file name.
pub const JAR_EXTENSION: &str = ".jar";

/// Version expression meaning "newest available".
pub const LATEST: &str = "*";

pub fn is_modrinth_slug(identifier: &str) -> bool {
    MODRINTH_SLUG.is_match(identifier)
}

pub fn is_github_owner(owner: &str) -> bool {
    owner.len() <= GITHUB_OWNER_MAX_LEN && GITHUB_OWNER.is_match(owner)
}

pub fn is_github_repo(repo: &str) -> bool {
    GITHUB_REPO.is_match(repo)
}

/// Split `owner/repo`, validating both halves.
pub fn split_github_project(identifier: &str) -> Option<(&str, &str)> {
    let (owner, repo) = identifier.split_once('/')?;
    (is_github_owner(owner) && is_github_repo(repo)).then_some((owner, repo))
}

/// Split a release expression into tag and optional asset file name on the first `/`.
pub fn split_tag_and_file(expr: &str) -> (&str, Option<&str>) {
    match expr.split_once('/') {
        Some((tag, file)) if !file.is_empty() => (tag, Some(file)),
        Some((tag, _)) => (tag, None),
        None => (expr, None),
    }
}

pub fn is_jar_name(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(JAR_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs() {
        assert!(is_modrinth_slug("sodium"));
        assert!(is_modrinth_slug("fabric-api"));
        assert!(is_modrinth_slug("Jade_(WTHIT)"));
        assert!(!is_modrinth_slug("ab"));
        assert!(!is_modrinth_slug(&"a".repeat(65)));
        assert!(!is_modrinth_slug("PaperMC/Paper"));
        assert!(!is_modrinth_slug("has space"));
    }

    #[test]
    fn github_owner_rules() {
        assert!(is_github_owner("PaperMC"));
        assert!(is_github_owner("a"));
        assert!(is_github_owner("some-org-2"));
        assert!(is_github_owner(&"a".repeat(39)));
        assert!(!is_github_owner(&"a".repeat(40)));
        assert!(!is_github_owner("-lead"));
        assert!(!is_github_owner("trail-"));
        assert!(!is_github_owner("dou--ble"));
        assert!(!is_github_owner("under_score"));
        assert!(!is_github_owner(""));
    }

    #[test]
    fn github_project_split() {
        assert_eq!(split_github_project("PaperMC/Paper"), Some(("PaperMC", "Paper")));
        assert_eq!(
            split_github_project("owner/repo.name_v2-x"),
            Some(("owner", "repo.name_v2-x"))
        );
        assert_eq!(split_github_project("sodium"), None);
        assert_eq!(split_github_project("a/b/c"), None);
        assert_eq!(split_github_project("owner/"), None);
    }

    #[test]
    fn tag_and_file_split_on_first_slash() {
        assert_eq!(split_tag_and_file("*"), ("*", None));
        assert_eq!(split_tag_and_file("v1.2/Mod-1.2.jar"), ("v1.2", Some("Mod-1.2.jar")));
        assert_eq!(split_tag_and_file("v1/dir/file.jar"), ("v1", Some("dir/file.jar")));
        assert_eq!(split_tag_and_file("v1/"), ("v1", None));
    }

    #[test]
    fn jar_names() {
        assert!(is_jar_name("Mod-1.2.jar"));
        assert!(is_jar_name("MOD.JAR"));
        assert!(!is_jar_name("mod-sources.zip"));
        assert!(!is_jar_name("notajar"));
    }
}

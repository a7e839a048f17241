//! Target resolution: which containers a chaos command applies to.

use rand::seq::SliceRandom;
use regex::Regex;
use tracing::debug;

use crate::client::ContainerClient;
use crate::container::Container;
use crate::error::ChaosError;

/// Prefix marking a positional argument as a regular expression.
pub const RE2_PREFIX: &str = "re2:";

/// Which containers an invocation targets.
#[derive(Debug, Clone)]
pub enum Selector {
    /// Every running container.
    All,
    /// Containers whose display name equals one of the entries.
    Names(Vec<String>),
    /// Containers whose display name matches the pattern.
    Pattern(Regex),
}

impl Selector {
    /// Classify positional CLI arguments.
    ///
    /// Zero arguments selects everything; a single `re2:`-prefixed
    /// argument is a pattern (prefix stripped, nothing else trimmed);
    /// anything else is a list of literal names.
    pub fn parse(args: &[String]) -> Result<Self, ChaosError> {
        match args {
            [] => Ok(Selector::All),
            [single] => match single.strip_prefix(RE2_PREFIX) {
                Some(pattern) => Ok(Selector::Pattern(Regex::new(pattern)?)),
                None => Ok(Selector::Names(vec![single.clone()])),
            },
            many => Ok(Selector::Names(many.to_vec())),
        }
    }

    /// Whether `container` is selected, by display name.
    pub fn matches(&self, container: &Container) -> bool {
        let name = container.name();
        match self {
            Selector::All => true,
            Selector::Names(names) => names.iter().any(|n| n == name),
            Selector::Pattern(re) => re.is_match(name),
        }
    }

    /// Resolve the current target set against the runtime.
    ///
    /// With `random` set and a non-empty match, exactly one target is
    /// picked uniformly. An empty match set is not an error.
    pub async fn resolve(
        &self,
        client: &dyn ContainerClient,
        random: bool,
    ) -> Result<Vec<Container>, ChaosError> {
        let matched = client.list_running(&|c| self.matches(c)).await?;
        debug!("{} matching container(s)", matched.len());

        if random {
            let mut rng = rand::thread_rng();
            if let Some(chosen) = matched.choose(&mut rng) {
                return Ok(vec![chosen.clone()]);
            }
        }
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockClient;
    use std::collections::HashMap;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn running(id: &str, name: &str) -> Container {
        Container::new(id, name, "img", HashMap::new(), true)
    }

    #[test]
    fn no_args_selects_all() {
        assert!(matches!(Selector::parse(&[]).unwrap(), Selector::All));
    }

    #[test]
    fn single_plain_arg_is_a_name() {
        let sel = Selector::parse(&args(&["web-1"])).unwrap();
        match sel {
            Selector::Names(names) => assert_eq!(names, vec!["web-1"]),
            other => panic!("expected names, got {other:?}"),
        }
    }

    #[test]
    fn multiple_args_are_names() {
        let sel = Selector::parse(&args(&["a", "c"])).unwrap();
        match sel {
            Selector::Names(names) => assert_eq!(names, vec!["a", "c"]),
            other => panic!("expected names, got {other:?}"),
        }
    }

    #[test]
    fn re2_prefix_is_stripped_not_trimmed() {
        // Only the literal prefix goes; characters from the prefix
        // alphabet at the start of the pattern survive.
        let sel = Selector::parse(&args(&["re2:2e.*"])).unwrap();
        match sel {
            Selector::Pattern(re) => assert_eq!(re.as_str(), "2e.*"),
            other => panic!("expected pattern, got {other:?}"),
        }
    }

    #[test]
    fn invalid_regex_is_a_validation_error() {
        let err = Selector::parse(&args(&["re2:["])).unwrap_err();
        assert!(matches!(err, ChaosError::BadPattern(_)));
    }

    #[test]
    fn name_match_ignores_leading_slash() {
        let sel = Selector::parse(&args(&["web-1"])).unwrap();
        assert!(sel.matches(&running("a", "/web-1")));
        assert!(!sel.matches(&running("b", "/web-10")));
    }

    #[test]
    fn pattern_matches_stripped_name() {
        let sel = Selector::parse(&args(&["re2:^svc-"])).unwrap();
        assert!(sel.matches(&running("a", "/svc-1")));
        assert!(sel.matches(&running("b", "/svc-2")));
        assert!(!sel.matches(&running("c", "/db")));
    }

    #[tokio::test]
    async fn resolve_by_names() {
        let client = MockClient::new(vec![
            running("1", "/a"),
            running("2", "/b"),
            running("3", "/c"),
        ]);
        let sel = Selector::parse(&args(&["a", "c"])).unwrap();
        let targets = sel.resolve(&client, false).await.unwrap();
        let mut names: Vec<_> = targets.iter().map(|c| c.name().to_string()).collect();
        names.sort();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn resolve_all_returns_every_running_container() {
        let client = MockClient::new(vec![running("1", "/a"), running("2", "/b")]);
        let targets = Selector::All.resolve(&client, false).await.unwrap();
        assert_eq!(targets.len(), 2);
    }

    #[tokio::test]
    async fn resolve_empty_match_is_not_an_error() {
        let client = MockClient::new(vec![running("1", "/a")]);
        let sel = Selector::parse(&args(&["nope"])).unwrap();
        let targets = sel.resolve(&client, false).await.unwrap();
        assert!(targets.is_empty());
    }

    #[tokio::test]
    async fn random_narrows_to_one_of_the_matches() {
        let client = MockClient::new(vec![
            running("1", "/a"),
            running("2", "/b"),
            running("3", "/c"),
        ]);
        for _ in 0..10 {
            let targets = Selector::All.resolve(&client, true).await.unwrap();
            assert_eq!(targets.len(), 1);
            assert!(["a", "b", "c"].contains(&targets[0].name()));
        }
    }

    #[tokio::test]
    async fn random_with_empty_match_stays_empty() {
        let client = MockClient::new(vec![running("1", "/a")]);
        let sel = Selector::parse(&args(&["nope"])).unwrap();
        let targets = sel.resolve(&client, true).await.unwrap();
        assert!(targets.is_empty());
    }
}

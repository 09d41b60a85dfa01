//! Sessions store tests.

use super::harness::{hub, MockAgent};
use crate::StoreError;
use agent_service_client::{AgentService, Session, SessionPatch, SessionTime};
use std::sync::Arc;

fn retitle(title: &str) -> SessionPatch {
    SessionPatch {
        title: Some(title.to_string()),
    }
}

fn ids(sessions: &[Session]) -> Vec<String> {
    sessions.iter().map(|s| s.id.clone()).collect()
}

#[tokio::test]
async fn equivalent_directories_share_one_context() {
    let agent = MockAgent::new();
    agent.seed_session("/a/b/", "s1", "First");
    let hub = hub(&agent);

    hub.sessions.load_sessions("proj1", Some("/a/b/")).await;

    let trailing = hub.sessions.sessions("proj1", Some("/a/b/"));
    let bare = hub.sessions.sessions("proj1", Some("/a/b"));
    let windows = hub.sessions.sessions("proj1", Some("\\a\\b\\"));
    assert_eq!(ids(&trailing), vec!["s1"]);
    assert!(Arc::ptr_eq(&trailing, &bare));
    assert!(Arc::ptr_eq(&bare, &windows));
}

#[tokio::test]
async fn aggregate_concatenates_worktree_contexts() {
    let agent = MockAgent::new();
    agent.seed_session("/wt/a", "s1", "A");
    agent.seed_session("/wt/b", "s2", "B");
    agent.seed_session("/other", "s3", "Other project");
    let hub = hub(&agent);

    hub.sessions.load_sessions("proj1", Some("/wt/b")).await;
    hub.sessions.load_sessions("proj1", Some("/wt/a")).await;
    hub.sessions.load_sessions("proj2", Some("/other")).await;

    assert_eq!(ids(&hub.sessions.sessions("proj1", None)), vec!["s1", "s2"]);
    assert_eq!(ids(&hub.sessions.sessions("proj2", None)), vec!["s3"]);
}

#[tokio::test]
async fn aggregate_without_contexts_is_empty_not_absent() {
    let agent = MockAgent::new();
    agent.seed_session("/wt/a", "s1", "A");
    let hub = hub(&agent);

    assert!(!hub.sessions.has_context("proj1", None));
    hub.sessions.rebuild_aggregate("proj1");
    assert!(hub.sessions.has_context("proj1", None));
    assert!(hub.sessions.sessions("proj1", None).is_empty());

    hub.sessions.load_sessions("proj1", Some("/wt/a")).await;
    assert_eq!(hub.sessions.sessions("proj1", None).len(), 1);

    hub.sessions.forget_context("proj1", Some("/wt/a"));
    assert!(hub.sessions.has_context("proj1", None));
    assert!(hub.sessions.sessions("proj1", None).is_empty());
}

#[tokio::test]
async fn create_without_id_fails_and_clears_create_loading() {
    let agent = MockAgent::new();
    agent.set_created_session(Session {
        id: String::new(),
        project_id: "proj1".to_string(),
        directory: "/path".to_string(),
        title: "Title".to_string(),
        version: String::new(),
        time: SessionTime::default(),
    });
    let hub = hub(&agent);

    let err = hub
        .sessions
        .create_session("proj1", Some("/path"), Some("Title"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        StoreError::ValidationFailed("Session created but has no ID".to_string())
    );
    assert_eq!(err.to_string(), "Session created but has no ID");
    assert!(!hub.sessions.create_loading());
    assert_eq!(
        hub.sessions.error().as_deref(),
        Some("Session created but has no ID")
    );
    assert!(hub.sessions.sessions("proj1", Some("/path")).is_empty());
}

#[tokio::test]
async fn create_session_selects_it_and_updates_aggregate() {
    let agent = MockAgent::new();
    let hub = hub(&agent);

    agent.hold("create_session");
    let (created, _) = tokio::join!(
        hub.sessions.create_session("proj1", Some("/wt/a"), Some(" Title ")),
        async {
            tokio::task::yield_now().await;
            assert!(hub.sessions.create_loading());
            agent.release("create_session", 1);
        }
    );
    let created = created.unwrap();

    assert_eq!(created.title, "Title");
    assert!(!hub.sessions.create_loading());
    assert_eq!(hub.sessions.current_session(), Some(created.clone()));
    assert_eq!(
        ids(&hub.sessions.sessions("proj1", Some("/wt/a"))),
        vec![created.id.clone()]
    );
    assert_eq!(ids(&hub.sessions.sessions("proj1", None)), vec![created.id]);
}

#[tokio::test]
async fn rejected_update_converges_on_canonical_list() {
    let agent = MockAgent::new();
    agent.seed_session("/wt", "s1", "Original");
    agent.seed_session("/wt", "s2", "Other");
    let hub = hub(&agent);
    hub.sessions.load_sessions("proj1", Some("/wt")).await;

    agent.fail("update_session", "rejected");
    hub.sessions
        .update_session("proj1", Some("/wt"), "s1", retitle("Changed"))
        .await;

    let canonical = agent.list_sessions(Some("/wt")).await.unwrap();
    assert_eq!(*hub.sessions.sessions("proj1", Some("/wt")), canonical);
    assert_eq!(*hub.sessions.sessions("proj1", None), canonical);
    assert_eq!(hub.sessions.error().as_deref(), Some("rejected"));
}

#[tokio::test]
async fn update_reconciles_context_aggregate_and_selection() {
    let agent = MockAgent::new();
    agent.seed_session("/wt", "s1", "Original");
    let hub = hub(&agent);
    hub.sessions.load_sessions("proj1", Some("/wt")).await;
    hub.sessions.select_session("proj1", Some("/wt"), Some("s1"));

    hub.sessions
        .update_session("proj1", Some("/wt"), "s1", retitle("  Spaced  "))
        .await;

    assert_eq!(hub.sessions.sessions("proj1", Some("/wt"))[0].title, "Spaced");
    assert_eq!(hub.sessions.sessions("proj1", None)[0].title, "Spaced");
    assert_eq!(hub.sessions.current_session().unwrap().title, "Spaced");
}

#[tokio::test]
async fn update_of_unknown_session_makes_no_remote_call() {
    let agent = MockAgent::new();
    agent.seed_session("/wt", "s1", "Original");
    let hub = hub(&agent);
    hub.sessions.load_sessions("proj1", Some("/wt")).await;
    let before = hub.sessions.sessions("proj1", Some("/wt"));

    hub.sessions
        .update_session("proj1", Some("/wt"), "missing", retitle("X"))
        .await;

    assert_eq!(agent.calls_to("update_session"), 0);
    assert!(Arc::ptr_eq(&before, &hub.sessions.sessions("proj1", Some("/wt"))));
}

#[tokio::test]
async fn delete_is_optimistic_and_deselects() {
    let agent = MockAgent::new();
    agent.seed_session("/wt", "s1", "Doomed");
    agent.seed_session("/wt", "s2", "Kept");
    let hub = hub(&agent);
    hub.sessions.load_sessions("proj1", Some("/wt")).await;
    hub.sessions.select_session("proj1", Some("/wt"), Some("s1"));

    agent.hold("delete_session");
    tokio::join!(hub.sessions.delete_session("proj1", Some("/wt"), "s1"), async {
        tokio::task::yield_now().await;
        assert_eq!(ids(&hub.sessions.sessions("proj1", None)), vec!["s2"]);
        assert_eq!(hub.sessions.current_session(), None);
        agent.release("delete_session", 1);
    });

    assert_eq!(ids(&hub.sessions.sessions("proj1", Some("/wt"))), vec!["s2"]);
    assert_eq!(hub.sessions.error(), None);
}

#[tokio::test]
async fn failed_delete_restores_session_and_selection() {
    let agent = MockAgent::new();
    agent.seed_session("/wt", "s1", "Kept");
    let hub = hub(&agent);
    hub.sessions.load_sessions("proj1", Some("/wt")).await;
    hub.sessions.select_session("proj1", Some("/wt"), Some("s1"));

    agent.fail("delete_session", "");
    hub.sessions.delete_session("proj1", Some("/wt"), "s1").await;

    assert_eq!(ids(&hub.sessions.sessions("proj1", None)), vec!["s1"]);
    assert_eq!(hub.sessions.current_session().unwrap().id, "s1");
    assert_eq!(hub.sessions.error().as_deref(), Some("Failed to delete session"));

    hub.sessions.clear_error();
    assert_eq!(hub.sessions.error(), None);
}

#[tokio::test]
async fn select_unknown_session_clears_selection() {
    let agent = MockAgent::new();
    agent.seed_session("/wt", "s1", "Only");
    let hub = hub(&agent);
    hub.sessions.load_sessions("proj1", Some("/wt")).await;

    assert!(hub.sessions.select_session("proj1", Some("/wt"), Some("s1")).is_some());
    assert!(hub.sessions.select_session("proj1", Some("/wt"), Some("nope")).is_none());
    assert_eq!(hub.sessions.current_session(), None);
}

#[tokio::test]
async fn project_root_context_does_not_depend_on_first_touch() {
    for worktree_first in [true, false] {
        let agent = MockAgent::new();
        agent.seed_project("p1", "First", None);
        agent.seed_session("/src/p1", "root", "Root");
        agent.seed_session("/wt/a", "wa", "Worktree");
        let hub = hub(&agent);
        hub.projects.load_projects().await;

        if worktree_first {
            hub.sessions.load_sessions("p1", Some("/wt/a")).await;
            hub.sessions.load_sessions("p1", None).await;
        } else {
            hub.sessions.load_sessions("p1", None).await;
            hub.sessions.load_sessions("p1", Some("/wt/a")).await;
        }

        assert_eq!(ids(&hub.sessions.sessions("p1", Some("/src/p1"))), vec!["root"]);
        assert_eq!(ids(&hub.sessions.sessions("p1", Some("/wt/a"))), vec!["wa"]);
        assert_eq!(ids(&hub.sessions.sessions("p1", None)), vec!["root", "wa"]);
        assert_eq!(agent.bindings(), vec!["", "/src/p1"]);
    }
}

#[tokio::test]
async fn root_load_names_the_project_path_even_on_an_early_handle() {
    let agent = MockAgent::new();
    agent.seed_project("p1", "First", None);
    agent.seed_session("/src/p1", "root", "Root");
    agent.seed_session("/wt/a", "wa", "Worktree");
    let hub = hub(&agent);

    // The project handle is built before the project path is known.
    hub.sessions.load_sessions("p1", Some("/wt/a")).await;
    hub.projects.load_projects().await;
    hub.sessions.load_sessions("p1", None).await;

    assert_eq!(agent.bindings(), vec!["", ""]);
    assert_eq!(agent.call_args("list_sessions"), vec!["/wt/a", "/src/p1"]);
    assert_eq!(ids(&hub.sessions.sessions("p1", None)), vec!["root", "wa"]);
}

#[tokio::test]
async fn pathless_create_survives_a_scoped_load() {
    let agent = MockAgent::new();
    agent.seed_session("/wt/a", "wa", "Worktree");
    let hub = hub(&agent);

    let created = hub
        .sessions
        .create_session("p1", None, Some("Bare"))
        .await
        .unwrap();
    assert_eq!(ids(&hub.sessions.sessions("p1", None)), vec![created.id.clone()]);

    hub.sessions.load_sessions("p1", Some("/wt/a")).await;

    let aggregate = ids(&hub.sessions.sessions("p1", None));
    assert_eq!(aggregate, vec![created.id.clone(), "wa".to_string()]);
    let current = hub.sessions.current_session().unwrap();
    assert_eq!(current.id, created.id);
    assert!(aggregate.contains(&current.id));
}

#[tokio::test]
async fn pathless_create_lands_in_the_project_root_context() {
    let agent = MockAgent::new();
    agent.seed_project("p1", "First", None);
    agent.seed_session("/wt/a", "wa", "Worktree");
    let hub = hub(&agent);
    hub.projects.load_projects().await;

    let created = hub
        .sessions
        .create_session("p1", None, Some("Bare"))
        .await
        .unwrap();
    hub.sessions.load_sessions("p1", Some("/wt/a")).await;

    assert_eq!(agent.call_args("create_session"), vec!["/src/p1"]);
    assert_eq!(
        ids(&hub.sessions.sessions("p1", Some("/src/p1"))),
        vec![created.id.clone()]
    );
    assert_eq!(
        ids(&hub.sessions.sessions("p1", None)),
        vec![created.id, "wa".to_string()]
    );
}

#[tokio::test]
async fn directory_less_writes_target_the_owning_context() {
    let agent = MockAgent::new();
    agent.seed_session("/wt/a", "s1", "A");
    agent.seed_session("/wt/b", "s2", "B");
    let hub = hub(&agent);
    hub.sessions.load_sessions("proj1", Some("/wt/a")).await;
    hub.sessions.load_sessions("proj1", Some("/wt/b")).await;

    hub.sessions
        .update_session("proj1", None, "s2", retitle("Renamed"))
        .await;

    assert_eq!(hub.sessions.error(), None);
    assert_eq!(hub.sessions.sessions("proj1", Some("/wt/b"))[0].title, "Renamed");
    assert_eq!(ids(&hub.sessions.sessions("proj1", None)), vec!["s1", "s2"]);

    hub.sessions.delete_session("proj1", None, "s1").await;

    assert_eq!(hub.sessions.error(), None);
    assert!(hub.sessions.sessions("proj1", Some("/wt/a")).is_empty());
    assert_eq!(ids(&hub.sessions.sessions("proj1", None)), vec!["s2"]);
    let remote = agent.list_sessions(Some("/wt/a")).await.unwrap();
    assert!(remote.is_empty());
}

#[tokio::test]
async fn forgetting_the_project_drops_every_context() {
    let agent = MockAgent::new();
    agent.seed_session("/wt/a", "s1", "A");
    agent.seed_session("/wt/b", "s2", "B");
    let hub = hub(&agent);
    hub.sessions.load_sessions("proj1", Some("/wt/a")).await;
    hub.sessions.load_sessions("proj1", Some("/wt/b")).await;

    hub.sessions.forget_context("proj1", None);

    assert!(!hub.sessions.has_context("proj1", Some("/wt/a")));
    assert!(!hub.sessions.has_context("proj1", Some("/wt/b")));
    assert!(hub.sessions.sessions("proj1", None).is_empty());
    assert!(!hub.sessions.is_loading("proj1", None));
}

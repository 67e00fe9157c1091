use tracing::info;

use crate::core::errors::ApiResult;
use crate::core::store::{KvStore, KvStoreExt};
use crate::follow::set_follow;
use crate::models::models::User;
use crate::posts;
use crate::users::{find_by_email, register};

struct DemoUser {
    username: &'static str,
    posts: &'static [(&'static str, Option<&'static str>)],
}

const DEMO_USERS: &[DemoUser] = &[
    DemoUser {
        username: "test",
        posts: &[("This is my first post on Plaza!", None)],
    },
    DemoUser {
        username: "alice",
        posts: &[
            ("Welcome to my feed! Excited to share thoughts here.", None),
            ("Half price on handmade mugs this weekend.", Some("Promotions")),
        ],
    },
    DemoUser {
        username: "bob",
        posts: &[(
            "Hey everyone! Just joined, looking forward to connecting with you all.",
            None,
        )],
    },
];

/// Set once seeding finished, so later calls cost a single read.
const SEEDED_MARKER_KEY: &str = "demo_seeded";

fn demo_email(username: &str) -> String {
    format!("{}@plaza.local", username)
}

/// Creates the demo accounts (password = username + "123") with a few posts,
/// and makes `test` follow `bob`. Accounts that already exist are left alone.
/// The Spin component calls this per request when seeding is enabled; after
/// the first complete run it returns right after checking the marker.
pub fn seed_demo_data(store: &dyn KvStore) -> ApiResult<()> {
    if store.get(SEEDED_MARKER_KEY)?.is_some() {
        return Ok(());
    }

    let mut seeded: Vec<User> = Vec::new();

    for demo in DEMO_USERS {
        let email = demo_email(demo.username);
        let user = match find_by_email(store, &email)? {
            Some(existing) => existing,
            None => {
                let user = register(store, demo.username, &email, &format!("{}123", demo.username))?;
                for &(content, category) in demo.posts {
                    posts::create(store, &user.id, Some(content), None, category)?;
                }
                info!(username = demo.username, "seeded demo user");
                user
            }
        };
        seeded.push(user);
    }

    let id_of = |name: &str| seeded.iter().find(|u| u.username == name).map(|u| u.id.clone());
    if let (Some(test_id), Some(bob_id)) = (id_of("test"), id_of("bob")) {
        set_follow(store, &test_id, &bob_id, true)?;
    }

    store.set_json(SEEDED_MARKER_KEY, &crate::core::helpers::now_utc())?;
    info!("demo data seeded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::MemoryStore;
    use crate::posts::SortKey;
    use crate::users::{authenticate, load_users};

    #[test]
    fn seeding_is_idempotent() {
        let store = MemoryStore::new();
        seed_demo_data(&store).unwrap();
        seed_demo_data(&store).unwrap();

        assert_eq!(load_users(&store).unwrap().len(), 3);
        assert_eq!(posts::list(&store, None, SortKey::Newest).unwrap().len(), 4);
        assert_eq!(posts::list(&store, Some("Promotions"), SortKey::Newest).unwrap().len(), 1);
    }

    #[test]
    fn seeding_is_skipped_once_marked() {
        let store = MemoryStore::new();
        seed_demo_data(&store).unwrap();
        assert!(store.get(SEEDED_MARKER_KEY).unwrap().is_some());

        store.delete(crate::config::USERS_LIST_KEY).unwrap();
        seed_demo_data(&store).unwrap();
        assert!(load_users(&store).unwrap().is_empty());
    }

    #[test]
    fn seeding_resumes_after_a_partial_run() {
        let store = MemoryStore::new();
        register(&store, "alice", &demo_email("alice"), "alice123").unwrap();

        seed_demo_data(&store).unwrap();
        assert_eq!(load_users(&store).unwrap().len(), 3);
    }

    #[test]
    fn demo_accounts_can_log_in_and_follow_is_symmetric() {
        let store = MemoryStore::new();
        seed_demo_data(&store).unwrap();

        let test = authenticate(&store, &demo_email("test"), "test123").unwrap();
        let bob = authenticate(&store, &demo_email("bob"), "bob123").unwrap();
        assert_eq!(test.following, vec![bob.id.clone()]);
        assert_eq!(bob.followers, vec![test.id]);
    }
}

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use common::{Accounts, People};
use objrepo::FindOptions;

#[tokio::test]
async fn find_and_delete_items_removes_every_match_and_reports_the_count() {
    let repo = common::fixture_repository("fad-basic").await;
    common::populate_aaa_to_fff(&repo).await;

    let people = repo.collection::<People>();
    let deleted = people
        .find_and_delete_items(&FindOptions::new().query_eq("name", "Bob"))
        .await
        .unwrap();
    assert_eq!(deleted, 1);

    assert_eq!(people.count_items(&FindOptions::new()).await.unwrap(), 2);

    // Deleting through `People` also removes the item from the base
    // `Accounts` collection, since it's the same underlying record.
    let accounts = repo.collection::<Accounts>();
    assert!(accounts
        .get_item("bbb", Default::default())
        .await
        .is_err());
}

#[tokio::test]
async fn find_and_delete_items_with_no_matches_deletes_nothing() {
    let repo = common::fixture_repository("fad-empty").await;
    common::populate_aaa_to_fff(&repo).await;

    let people = repo.collection::<People>();
    let deleted = people
        .find_and_delete_items(&FindOptions::new().query_eq("name", "Nobody"))
        .await
        .unwrap();
    assert_eq!(deleted, 0);
    assert_eq!(people.count_items(&FindOptions::new()).await.unwrap(), 3);
}

#[tokio::test]
async fn for_each_items_visits_every_match_in_order() {
    let repo = common::fixture_repository("for-each").await;
    common::populate_aaa_to_fff(&repo).await;

    let people = repo.collection::<People>();
    let visited = AtomicUsize::new(0);
    let mut seen_keys = Vec::new();
    people
        .for_each_items(&FindOptions::new().order_by("name"), |item| {
            visited.fetch_add(1, Ordering::SeqCst);
            seen_keys.push(item.primary_key().to_string());
            async { Ok(()) }
        })
        .await
        .unwrap();

    assert_eq!(visited.load(Ordering::SeqCst), 3);
    assert_eq!(seen_keys, vec!["aaa", "bbb", "ccc"]);
}

#[tokio::test]
async fn for_each_items_propagates_a_callback_error_and_stops() {
    let repo = common::fixture_repository("for-each-error").await;
    common::populate_aaa_to_fff(&repo).await;

    let people = repo.collection::<People>();
    let visited = AtomicUsize::new(0);
    let result = people
        .for_each_items(&FindOptions::new().order_by("name"), |_item| {
            let count = visited.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if count == 2 {
                    Err(objrepo::RepoError::UserError("stop here".to_string()))
                } else {
                    Ok(())
                }
            }
        })
        .await;

    assert!(result.is_err());
    assert_eq!(visited.load(Ordering::SeqCst), 2);
}

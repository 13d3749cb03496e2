#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use nichofy_core::RepoError;
    use nichofy_core::domain::{NewPost, PostFilters, PostPatch, PostQuery, PostSort, SortField};
    use tokio::sync::mpsc;

    use crate::cache::QueryCache;
    use crate::posts::{LiveSubscriptions, PostRepository};
    use crate::store::InMemoryDocumentStore;

    struct Fixture {
        store: Arc<InMemoryDocumentStore>,
        repo: PostRepository,
    }

    fn fixture() -> Fixture {
        fixture_with_ttl(Duration::from_secs(300))
    }

    fn fixture_with_ttl(ttl: Duration) -> Fixture {
        let store = Arc::new(InMemoryDocumentStore::default());
        let repo = PostRepository::new(store.clone(), Arc::new(QueryCache::with_ttl(ttl)));
        Fixture { store, repo }
    }

    fn law_post(title: &str) -> NewPost {
        NewPost::new(title, format!("{title} explicado em cinco passos"))
            .with_prompt("Crie um post educativo")
            .with_category("Educativo")
            .with_niche("Direito")
    }

    fn newest_first(filters: PostFilters) -> PostQuery {
        PostQuery::new(filters).sorted(PostSort::desc(SortField::CreatedAt))
    }

    #[tokio::test]
    async fn test_repeated_first_page_hits_store_once() {
        let f = fixture();
        f.repo.create("ana", law_post("Contratos")).await.unwrap();
        let query = newest_first(PostFilters::default()).page_size(10);

        let first = f.repo.list("ana", &query).await.unwrap();
        let second = f.repo.list("ana", &query).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(f.store.find_calls(), 1);
    }

    #[tokio::test]
    async fn test_writes_invalidate_owner_cache() {
        let f = fixture();
        let query = newest_first(PostFilters::default());
        let id = f.repo.create("ana", law_post("Contratos")).await.unwrap();

        f.repo.list("ana", &query).await.unwrap();
        assert_eq!(f.store.find_calls(), 1);

        f.repo.create("ana", law_post("Heranca")).await.unwrap();
        assert_eq!(f.repo.list("ana", &query).await.unwrap().posts.len(), 2);
        assert_eq!(f.store.find_calls(), 2);

        f.repo.update(&id, PostPatch::content("Contratos 2", "novo")).await.unwrap();
        let page = f.repo.list("ana", &query).await.unwrap();
        assert!(page.posts.iter().any(|p| p.title == "Contratos 2"));
        assert_eq!(f.store.find_calls(), 3);

        f.repo.delete(&id).await.unwrap();
        assert_eq!(f.repo.list("ana", &query).await.unwrap().posts.len(), 1);
        assert_eq!(f.store.find_calls(), 4);
    }

    #[tokio::test]
    async fn test_writes_leave_other_owners_cached() {
        let f = fixture();
        let query = newest_first(PostFilters::default());
        f.repo.create("bruno", law_post("Marcas")).await.unwrap();
        f.repo.list("bruno", &query).await.unwrap();

        f.repo.create("ana", law_post("Contratos")).await.unwrap();
        f.repo.list("bruno", &query).await.unwrap();

        assert_eq!(f.store.find_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_expires_after_ttl() {
        let f = fixture_with_ttl(Duration::from_secs(300));
        let query = newest_first(PostFilters::default());
        f.repo.list("ana", &query).await.unwrap();

        tokio::time::advance(Duration::from_secs(299)).await;
        f.repo.list("ana", &query).await.unwrap();
        assert_eq!(f.store.find_calls(), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        f.repo.list("ana", &query).await.unwrap();
        assert_eq!(f.store.find_calls(), 2);
    }

    #[tokio::test]
    async fn test_later_pages_are_never_cached() {
        let f = fixture();
        for title in ["a", "b", "c"] {
            f.repo.create("ana", law_post(title)).await.unwrap();
        }
        let query = PostQuery::new(PostFilters::default())
            .sorted(PostSort::asc(SortField::Title))
            .page_size(2);

        let first = f.repo.list("ana", &query).await.unwrap();
        let next = query.clone().after(first.next_cursor.clone().unwrap());

        let second = f.repo.list("ana", &next).await.unwrap();
        let again = f.repo.list("ana", &next).await.unwrap();

        assert_eq!(second.posts.len(), 1);
        assert_eq!(second.posts[0].title, "c");
        assert_eq!(second, again);
        assert_eq!(f.store.find_calls(), 3);
        assert_eq!(f.repo.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_search_returns_subset_of_page() {
        let f = fixture();
        f.repo.create("ana", law_post("Direito do Consumidor")).await.unwrap();
        f.repo.create("ana", law_post("Contratos")).await.unwrap();
        f.repo
            .create(
                "ana",
                NewPost::new("Receitas", "Bolo de cenoura").with_prompt("CONSUMIDOR feliz"),
            )
            .await
            .unwrap();

        let all = f
            .repo
            .list("ana", &newest_first(PostFilters::default()))
            .await
            .unwrap();
        let found = f
            .repo
            .list("ana", &newest_first(PostFilters::default().search("consumidor")))
            .await
            .unwrap();

        assert_eq!(found.posts.len(), 2);
        for post in &found.posts {
            assert!(post.matches_search("consumidor"));
            assert!(all.posts.contains(post));
        }
    }

    #[tokio::test]
    async fn test_search_only_scans_fetched_page() {
        let f = fixture();
        f.repo.create("ana", law_post("Alfa")).await.unwrap();
        f.repo.create("ana", law_post("Zeta unica")).await.unwrap();

        let query = PostQuery::new(PostFilters::default().search("unica"))
            .sorted(PostSort::asc(SortField::Title))
            .page_size(1);
        let page = f.repo.list("ana", &query).await.unwrap();

        // The match lives on the second page; the first comes back empty
        // but still points past the scanned document.
        assert!(page.posts.is_empty());
        assert!(page.next_cursor.is_some());
    }

    #[tokio::test]
    async fn test_list_is_scoped_to_owner() {
        let f = fixture();
        f.repo.create("ana", law_post("Contratos")).await.unwrap();
        f.repo.create("bruno", law_post("Contratos")).await.unwrap();

        let page = f
            .repo
            .list("ana", &newest_first(PostFilters::default().niche("Direito")))
            .await
            .unwrap();

        assert_eq!(page.posts.len(), 1);
        assert!(page.posts.iter().all(|p| p.owner_id == "ana"));
    }

    #[tokio::test]
    async fn test_second_delete_is_not_found() {
        let f = fixture();
        let id = f.repo.create("ana", law_post("Contratos")).await.unwrap();

        assert!(f.repo.delete(&id).await.is_ok());
        assert_eq!(f.repo.delete(&id).await, Err(RepoError::not_found(&id)));
    }

    #[tokio::test]
    async fn test_update_missing_post_is_not_found() {
        let f = fixture();
        let err = f
            .repo
            .update("ghost", PostPatch::favorite(true))
            .await
            .unwrap_err();
        assert_eq!(err, RepoError::not_found("ghost"));
    }

    #[tokio::test]
    async fn test_updated_at_strictly_increases() {
        let f = fixture();
        let id = f.repo.create("ana", law_post("Contratos")).await.unwrap();
        let created = f.repo.get(&id).await.unwrap().unwrap();
        assert!(created.created_at <= created.updated_at);

        let mut previous = created.updated_at;
        for round in 0..3 {
            f.repo
                .update(&id, PostPatch::content(format!("v{round}"), "corpo"))
                .await
                .unwrap();
            let post = f.repo.get(&id).await.unwrap().unwrap();
            assert!(post.updated_at > previous);
            assert_eq!(post.created_at, created.created_at);
            assert_eq!(post.owner_id, "ana");
            previous = post.updated_at;
        }
    }

    #[tokio::test]
    async fn test_favorite_update_is_visible_after_refetch() {
        let f = fixture();
        let id = f
            .repo
            .create(
                "ana",
                NewPost::new("Direitos", "Conteudo")
                    .with_niche("Direito")
                    .with_category("Educativo"),
            )
            .await
            .unwrap();
        let query = newest_first(PostFilters::default().category("Educativo"));

        let page = f.repo.list("ana", &query).await.unwrap();
        assert_eq!(page.posts.len(), 1);
        assert_eq!(page.posts[0].id, id);
        assert!(!page.posts[0].is_favorite);
        let finds = f.store.find_calls();

        f.repo.update(&id, PostPatch::favorite(true)).await.unwrap();

        let page = f.repo.list("ana", &query).await.unwrap();
        assert_eq!(page.posts.len(), 1);
        assert_eq!(page.posts[0].id, id);
        assert!(page.posts[0].is_favorite);
        assert_eq!(f.store.find_calls(), finds + 1);
    }

    #[tokio::test]
    async fn test_toggle_favorite_flips_flag() {
        let f = fixture();
        let id = f.repo.create("ana", law_post("Contratos")).await.unwrap();

        assert!(f.repo.toggle_favorite(&id).await.unwrap());
        assert!(!f.repo.toggle_favorite(&id).await.unwrap());
        assert!(matches!(
            f.repo.toggle_favorite("ghost").await,
            Err(RepoError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_toggle_favorite_invalidates_owner_cache() {
        let f = fixture();
        let id = f.repo.create("ana", law_post("Contratos")).await.unwrap();
        let query = newest_first(PostFilters::default());

        let before = f.repo.list("ana", &query).await.unwrap();
        assert!(!before.posts[0].is_favorite);
        f.repo.list("ana", &query).await.unwrap();
        assert_eq!(f.store.find_calls(), 1);

        f.repo.toggle_favorite(&id).await.unwrap();

        let after = f.repo.list("ana", &query).await.unwrap();
        assert!(after.posts[0].is_favorite);
        assert_eq!(f.store.find_calls(), 2);
    }

    #[tokio::test]
    async fn test_store_errors_pass_through_and_keep_cache() {
        let f = fixture();
        let query = newest_first(PostFilters::default());
        let id = f.repo.create("ana", law_post("Contratos")).await.unwrap();
        f.repo.list("ana", &query).await.unwrap();

        f.store.set_offline(true);
        assert!(matches!(
            f.repo.create("ana", law_post("Falha")).await,
            Err(RepoError::Connection(_))
        ));
        assert!(matches!(
            f.repo.delete(&id).await,
            Err(RepoError::Connection(_))
        ));
        // A failed write does not invalidate; the cached page still answers.
        assert_eq!(f.repo.list("ana", &query).await.unwrap().posts.len(), 1);
        assert_eq!(f.repo.cache().len(), 1);

        let uncached = query.clone().page_size(5);
        assert!(matches!(
            f.repo.list("ana", &uncached).await,
            Err(RepoError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn test_stats_cover_all_posts() {
        let f = fixture();
        f.repo.create("ana", law_post("a").favorite()).await.unwrap();
        f.repo.create("ana", law_post("b")).await.unwrap();
        f.repo
            .create("ana", NewPost::new("c", "d").with_niche("Saude"))
            .await
            .unwrap();
        f.repo.create("bruno", law_post("e")).await.unwrap();

        let stats = f.repo.stats("ana").await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.favorites, 1);
        assert_eq!(stats.by_niche.get("Direito"), Some(&2));
        assert_eq!(stats.by_niche.get("Saude"), Some(&1));
    }

    #[tokio::test]
    async fn test_subscription_delivers_until_unsubscribed() {
        let f = fixture();
        let live = LiveSubscriptions::new(f.store.clone());
        // A second client writing to the same store.
        let other_client = PostRepository::new(f.store.clone(), Arc::new(QueryCache::default()));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = live
            .subscribe(
                "ana",
                &PostQuery::new(PostFilters::default().favorite(true)).page_size(20),
                move |posts| {
                    let _ = tx.send(posts);
                },
            )
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap(), vec![]);

        let id = other_client
            .create("ana", law_post("Favorito").favorite())
            .await
            .unwrap();
        let delivered = rx.recv().await.unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].id, id);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());

        subscription.unsubscribe().await;
        assert!(!subscription.is_active());

        other_client
            .create("ana", law_post("Outro favorito").favorite())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());

        // Repeated unsubscribe is harmless.
        subscription.unsubscribe().await;
    }

    #[tokio::test]
    async fn test_dropped_subscription_stops_delivering() {
        let f = fixture();
        let live = LiveSubscriptions::new(f.store.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let subscription = live
            .subscribe("ana", &PostQuery::default(), move |posts| {
                let _ = tx.send(posts);
            })
            .await
            .unwrap();
        assert!(rx.recv().await.unwrap().is_empty());

        drop(subscription);
        f.repo.create("ana", law_post("Depois")).await.unwrap();

        // The callback, and with it the sender, goes away without another delivery.
        let next = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn test_subscription_applies_search() {
        let f = fixture();
        let live = LiveSubscriptions::new(f.store.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _subscription = live
            .subscribe(
                "ana",
                &PostQuery::new(PostFilters::default().search("heranca")),
                move |posts| {
                    let _ = tx.send(posts);
                },
            )
            .await
            .unwrap();
        assert!(rx.recv().await.unwrap().is_empty());

        f.repo.create("ana", law_post("Heranca")).await.unwrap();
        let delivered = rx.recv().await.unwrap();
        assert_eq!(delivered.len(), 1);

        // Changes the store-side result set, but nothing matching the search.
        f.repo.create("ana", law_post("Contratos")).await.unwrap();
        let delivered = rx.recv().await.unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].title, "Heranca");
    }

    #[tokio::test]
    async fn test_subscription_reports_transport_errors() {
        let f = fixture();
        let live = LiveSubscriptions::new(f.store.clone());
        let (updates_tx, mut updates) = mpsc::unbounded_channel();
        let (errors_tx, mut errors) = mpsc::unbounded_channel();

        let subscription = live
            .subscribe_with_errors(
                "ana",
                &PostQuery::default(),
                move |posts| {
                    let _ = updates_tx.send(posts);
                },
                move |err| {
                    let _ = errors_tx.send(err);
                },
            )
            .await
            .unwrap();
        updates.recv().await.unwrap();

        f.store.set_offline(true);
        assert!(matches!(errors.recv().await, Some(RepoError::Connection(_))));
        assert!(errors.recv().await.is_none());
        assert!(!subscription.is_active());
    }

    #[tokio::test]
    async fn test_subscribe_to_offline_store_fails() {
        let f = fixture();
        f.store.set_offline(true);
        let live = LiveSubscriptions::new(f.store.clone());

        let result = live.subscribe("ana", &PostQuery::default(), |_| {}).await;
        assert!(matches!(result, Err(RepoError::Connection(_))));
    }
}

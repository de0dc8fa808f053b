use super::fake_page::{FakeFactory, FakeSite, LOGIN, SITE, album, picture, test_config};
use crate::Error;
use crate::page::{FormLogin, NoLogin};
use crate::session::SessionDriver;
use crate::state::StateStore;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;

#[cfg(test)]
mod tests {
    use super::*;

    fn resumable_site() -> FakeSite {
        FakeSite::new()
            .login(LOGIN)
            .site(SITE, &[album(1), album(2)])
            .album(&album(1), "First", &[picture(1, 1), picture(1, 2)])
            .album(&album(2), "Second", &[picture(2, 1)])
            .picture(&picture(1, 1), "a", b"a")
            .picture(&picture(1, 2), "b", b"b")
            .picture(&picture(2, 1), "c", b"c")
    }

    fn form_login(config: &crate::RipConfig) -> FormLogin {
        FormLogin::new(
            config.email.clone(),
            config.password.clone(),
            config.login.clone(),
            Duration::from_millis(10),
            Duration::from_millis(10),
        )
    }

    fn staging_dirs_left(output: &Path) -> usize {
        fs::read_dir(output)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(".staging-"))
            .count()
    }

    #[tokio::test]
    async fn test_failed_session_resumes_after_completed_album() {
        let output = tempdir().unwrap();
        let config = test_config(output.path());
        let state = StateStore::open(&config.state_path).unwrap();
        let factory = FakeFactory::new(resumable_site());
        factory.fail_navigation(&album(2), 1);
        let login = form_login(&config);

        let summary = SessionDriver::new(&factory, &login, &state, &config)
            .run()
            .await
            .unwrap();

        assert_eq!(factory.opened.get(), 2);
        let journal = factory.journal();
        let journal = journal.borrow();
        assert_eq!(journal.sessions.len(), 2);

        // The second session goes straight past album 1 to album 2
        let second = &journal.sessions[1];
        assert!(second.contains(&SITE.to_string()));
        assert!(!second.contains(&album(1)));
        assert!(!second.contains(&picture(1, 1)));
        assert!(!second.contains(&picture(1, 2)));
        assert!(second.contains(&album(2)));
        assert!(second.contains(&picture(2, 1)));

        assert_eq!(summary.albums_skipped, 1);
        assert_eq!(summary.albums_completed, 1);
        assert_eq!(summary.pictures_downloaded, 1);
        assert_eq!(summary.sites_completed, 1);

        assert_eq!(state.len(), 6);
        assert_eq!(journal.closed, 2);
        assert!(
            journal
                .typed
                .contains(&("input#email".to_string(), "someone@example.com".to_string()))
        );
        assert_eq!(staging_dirs_left(output.path()), 0);
    }

    #[tokio::test]
    async fn test_completed_run_only_logs_in() {
        let output = tempdir().unwrap();
        let config = test_config(output.path());
        let state = StateStore::open(&config.state_path).unwrap();
        state.mark_completed(SITE).unwrap();
        let factory = FakeFactory::new(resumable_site());
        let login = form_login(&config);

        let summary = SessionDriver::new(&factory, &login, &state, &config)
            .run()
            .await
            .unwrap();

        assert_eq!(factory.journal().borrow().visits(), vec![LOGIN.to_string()]);
        assert_eq!(summary.sites_skipped, 1);
    }

    #[tokio::test]
    async fn test_exhausted_sessions_are_reported() {
        let output = tempdir().unwrap();
        let mut config = test_config(output.path());
        config.max_sessions = 3;
        config.timings.download_timeout_ms = 10;
        let state = StateStore::open(&config.state_path).unwrap();
        let site = FakeSite::new()
            .site(SITE, &[album(1)])
            .album(&album(1), "A", &[picture(1, 1)])
            .picture_without_download(&picture(1, 1), "never");
        let factory = FakeFactory::new(site);

        let result = SessionDriver::new(&factory, &NoLogin, &state, &config)
            .run()
            .await;

        match result {
            Err(Error::RetriesExhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, Error::DownloadTimeout(_)));
            }
            other => panic!("expected RetriesExhausted, got {:?}", other),
        }
        assert_eq!(factory.opened.get(), 3);
        assert!(state.is_empty());
        assert_eq!(staging_dirs_left(output.path()), 0);
    }

    #[tokio::test]
    async fn test_fatal_error_stops_immediately() {
        let output = tempdir().unwrap();
        let config = test_config(output.path());
        let state = StateStore::open(&config.state_path).unwrap();
        let factory = FakeFactory::failing_with_config_error(resumable_site());

        let result = SessionDriver::new(&factory, &NoLogin, &state, &config)
            .run()
            .await;

        assert!(matches!(result, Err(Error::Config(_))));
        assert_eq!(factory.opened.get(), 1);
    }

    #[tokio::test]
    async fn test_failed_login_restarts_session() {
        let output = tempdir().unwrap();
        let mut config = test_config(output.path());
        config.max_sessions = 2;
        let state = StateStore::open(&config.state_path).unwrap();
        // No login page: the email input never renders
        let site = FakeSite::new().site(SITE, &[album(1)]);
        let factory = FakeFactory::new(site);
        let login = form_login(&config);

        let result = SessionDriver::new(&factory, &login, &state, &config)
            .run()
            .await;

        assert!(matches!(result, Err(Error::RetriesExhausted { .. })));
        assert_eq!(factory.opened.get(), 2);
        assert_eq!(factory.journal().borrow().visit_count(SITE), 0);
    }

    #[tokio::test]
    async fn test_staging_directory_is_inside_output_root() {
        let output = tempdir().unwrap();
        let config = test_config(output.path());
        let state = StateStore::open(&config.state_path).unwrap();
        let factory = FakeFactory::new(resumable_site());
        let login = form_login(&config);

        SessionDriver::new(&factory, &login, &state, &config)
            .run()
            .await
            .unwrap();

        let staging_dirs = factory.staging_dirs.borrow();
        assert_eq!(staging_dirs.len(), 1);
        assert!(staging_dirs[0].is_absolute());
        assert!(
            staging_dirs[0]
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with(".staging-")
        );
        assert!(!staging_dirs[0].exists());
    }
}

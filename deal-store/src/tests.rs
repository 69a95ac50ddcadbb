#[cfg(test)]
mod tests {
    use crate::{DealLedger, DedupStore, LEDGER_HEADER};
    use chrono::{TimeZone, Utc};
    use dealwatch_core::{DealRecord, Post, SeenIdSet};
    use std::env;
    use std::ops::Deref;
    use std::path::{Path, PathBuf};

    /// File path inside a fresh directory that is removed on drop.
    struct TempPath(PathBuf);

    impl Deref for TempPath {
        type Target = Path;

        fn deref(&self) -> &Path {
            &self.0
        }
    }

    impl AsRef<Path> for TempPath {
        fn as_ref(&self) -> &Path {
            &self.0
        }
    }

    impl Drop for TempPath {
        fn drop(&mut self) {
            if let Some(dir) = self.0.parent() {
                let _ = std::fs::remove_dir_all(dir);
            }
        }
    }

    fn temp_path(name: &str) -> TempPath {
        TempPath(
            env::temp_dir()
                .join(format!("dealwatch_test_{}", uuid::Uuid::new_v4()))
                .join(name),
        )
    }

    fn record(id: &str, category: &str, title: &str, highlight: bool) -> DealRecord {
        let post = Post {
            id: id.to_string(),
            title: title.to_string(),
            url: format!("https://www.reddit.com/r/buildapcsales/comments/{}", id),
            source: "buildapcsales".to_string(),
            flair: Some(category.to_string()),
            created_utc: Utc.with_ymd_and_hms(2024, 3, 9, 8, 30, 0).unwrap(),
        };
        DealRecord::from_post(&post, category, "$10".to_string(), highlight)
    }

    #[tokio::test]
    async fn test_seen_ids_missing_file_loads_empty() {
        let path = temp_path("seen_ids.txt");
        let store = DedupStore::new(path.to_path_buf());
        let seen = store.load().await.expect("missing file should load");
        assert!(seen.is_empty());
    }

    #[tokio::test]
    async fn test_seen_ids_save_and_reload() {
        let path = temp_path("seen_ids.txt");
        let store = DedupStore::new(path.to_path_buf());

        let seen: SeenIdSet = ["b2", "a1", "c3"].iter().map(|s| s.to_string()).collect();
        store.save(&seen).await.expect("save");

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "a1\nb2\nc3\n");
        assert!(!path.with_file_name("seen_ids.txt.tmp").exists());

        let loaded = store.load().await.expect("reload");
        assert_eq!(loaded, seen);
    }

    #[tokio::test]
    async fn test_seen_ids_load_skips_blank_lines_and_whitespace() {
        let path = temp_path("seen_ids.txt");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "abc\n\n  def  \r\nabc\n").unwrap();

        let loaded = DedupStore::new(path.to_path_buf()).load().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains("def"));
    }

    #[tokio::test]
    async fn test_seen_ids_save_replaces_previous_contents() {
        let path = temp_path("seen_ids.txt");
        let store = DedupStore::new(path.to_path_buf());

        let mut seen = SeenIdSet::new();
        seen.insert("first");
        store.save(&seen).await.unwrap();
        seen.insert("second");
        store.save(&seen).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "first\nsecond\n");
    }

    #[tokio::test]
    async fn test_ledger_first_append_writes_header() {
        let path = temp_path("deals.csv");
        let ledger = DealLedger::new(path.to_path_buf());

        let written = ledger
            .append(&[record("x1", "GPU", "[GPU] RTX 4080 Super", true)])
            .await
            .unwrap();
        assert_eq!(written, 1);

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.split("\r\n");
        assert_eq!(lines.next(), Some(LEDGER_HEADER.join(",").as_str()));
        assert_eq!(
            lines.next(),
            Some(
                "YES,GPU,2024-03-09 08:30:00 UTC,$10,[GPU] RTX 4080 Super,\
                 https://www.reddit.com/r/buildapcsales/comments/x1,buildapcsales,GPU"
            )
        );
    }

    #[tokio::test]
    async fn test_ledger_appends_without_rewriting() {
        let path = temp_path("deals.csv");
        let ledger = DealLedger::new(path.to_path_buf());

        ledger
            .append(&[record("a", "GPU", "first", false)])
            .await
            .unwrap();
        ledger
            .append(&[
                record("b", "RAM", "second, with comma", false),
                record("c", "SSD", "third", true),
            ])
            .await
            .unwrap();

        let rows = ledger.rows().await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][4], "first");
        assert_eq!(rows[1][4], "second, with comma");
        assert_eq!(rows[2][0], "YES");

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("highlight,part").count(), 1);
    }

    #[tokio::test]
    async fn test_ledger_empty_append_still_creates_file_with_header() {
        let path = temp_path("deals.csv");
        let ledger = DealLedger::new(path.to_path_buf());

        assert_eq!(ledger.append(&[]).await.unwrap(), 0);
        let snapshot = ledger.snapshot().await.unwrap().expect("file exists");
        assert_eq!(snapshot.row_count, 0);
        assert_eq!(snapshot.file_name(), "deals.csv");
    }

    #[tokio::test]
    async fn test_ledger_snapshot_missing_file() {
        let path = temp_path("deals.csv");
        let ledger = DealLedger::new(path.to_path_buf());
        assert!(ledger.snapshot().await.unwrap().is_none());
        assert!(ledger.rows().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ledger_snapshot_counts_rows() {
        let path = temp_path("deals.csv");
        let ledger = DealLedger::new(path.to_path_buf());
        ledger
            .append(&[
                record("a", "GPU", "multi\nline title", false),
                record("b", "GPU", "plain", false),
            ])
            .await
            .unwrap();

        let snapshot = ledger.snapshot().await.unwrap().unwrap();
        assert_eq!(snapshot.row_count, 2);
        assert!(snapshot.as_text().starts_with("highlight,part,created"));
    }
}

//! End-to-end tests for reading a directory-backed vault through the cache.

use std::sync::Arc;

use tempfile::TempDir;
use vault_cache::{CacheConfig, CacheStatus, RemoteSource, VaultReader};
use vault_reader::DirectoryRemote;

struct TestVault {
    remote_dir: TempDir,
    cache_dir: TempDir,
}

impl TestVault {
    fn new() -> Self {
        let remote_dir = TempDir::new().unwrap();
        let root = remote_dir.path().join("Documents/Vault");
        std::fs::create_dir_all(root.join("Folder/img")).unwrap();
        std::fs::write(root.join("Folder/My Note.md"), "# My Note\n![](./img/a.png)\n").unwrap();
        std::fs::write(root.join("Folder/img/a.png"), [0x89u8, 0x50, 0x4e, 0x47]).unwrap();
        std::fs::write(root.join("Other.md"), "---\nalias: Alias One\n---\nOther\n").unwrap();

        Self {
            remote_dir,
            cache_dir: TempDir::new().unwrap(),
        }
    }

    fn write(&self, relative: &str, content: &str) {
        std::fs::write(self.remote_dir.path().join("Documents/Vault").join(relative), content).unwrap();
    }

    async fn reader(&self) -> VaultReader<DirectoryRemote> {
        let remote = Arc::new(DirectoryRemote::new(self.remote_dir.path().to_path_buf()).with_page_size(2));
        VaultReader::open(self.cache_dir.path(), remote, CacheConfig::default())
            .await
            .unwrap()
    }

    async fn selected_reader(&self) -> VaultReader<DirectoryRemote> {
        let reader = self.reader().await;
        let root = reader.remote().fetch_by_path("Documents/Vault").await.unwrap();
        reader
            .boundary()
            .select("Documents/Vault", &root.name, &root.id)
            .await
            .unwrap();
        reader.index().sync_tree().await.unwrap();
        reader
    }
}

#[tokio::test]
async fn indexes_and_reads_notes() {
    let vault = TestVault::new();
    let reader = vault.selected_reader().await;

    assert_eq!(reader.index().documents().await.len(), 2);

    let note = reader.open_note_at("Folder/My Note.md").await.unwrap();
    assert!(note.content.starts_with("# My Note"));

    let id = reader.links().slug_to_id("my-note").await.unwrap();
    assert_eq!(reader.index().cache_status(&id).await, CacheStatus::Fresh);
}

#[tokio::test]
async fn edits_on_disk_replace_cached_content() {
    let vault = TestVault::new();
    let reader = vault.selected_reader().await;
    reader.open_note_at("Other.md").await.unwrap();

    vault.write("Other.md", "rewritten with a different length\n");

    let note = reader.open_note_at("Other.md").await.unwrap();
    assert_eq!(note.content, "rewritten with a different length\n");
}

#[tokio::test]
async fn resolves_links_and_embeds() {
    let vault = TestVault::new();
    let reader = vault.selected_reader().await;

    reader.open_note_at("Other.md").await.unwrap();
    assert_eq!(reader.links().resolve("alias one").await.as_deref(), Some("other"));

    let embed = reader.embeds().resolve("./img/a.png", "Folder/My Note.md").await;
    let handle = embed.handle().unwrap();
    assert_eq!(handle.path, "Documents/Vault/Folder/img/a.png");
    assert_eq!(handle.mime_type, "image/png");
    assert_eq!(handle.len(), 4);
}

#[tokio::test]
async fn cache_outlives_the_process() {
    let vault = TestVault::new();
    {
        let reader = vault.selected_reader().await;
        reader.open_note_at("Folder/My Note.md").await.unwrap();
    }

    let reader = vault.reader().await;
    assert!(reader.boundary().current().await.is_some());
    let id = reader.links().slug_to_id("my-note").await.unwrap();
    assert!(reader.content().is_cached(&id).await);
}

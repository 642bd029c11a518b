use async_trait::async_trait;
use configuration::{AssetSettings, DatabaseSettings, HttpSettings};
use core_types::{ConservationStatus, NewCall, NewSpecies};
use database::{ConnectionProvider, DbError, DbRepository, ValidationError, run_migrations};
use fetcher::{
    AssetFetcher, AudioConverter, AudioDownloader, CallAsset, ConversionError, DownloadError, FetchError,
    FetchStatus, HttpDownloader,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

#[derive(Clone, Default)]
struct FakeDownloader {
    calls: Arc<AtomicUsize>,
    fail_when_url_contains: Option<&'static str>,
}

#[async_trait]
impl AudioDownloader for FakeDownloader {
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_when_url_contains.is_some_and(|needle| url.contains(needle)) {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: 404,
            }
            .into());
        }
        let body = format!("audio from {url}");
        tokio::fs::write(dest, body.as_bytes()).await?;
        Ok(body.len() as u64)
    }
}

#[derive(Clone, Default)]
struct FakeConverter {
    calls: Arc<AtomicUsize>,
    fail: bool,
}

#[async_trait]
impl AudioConverter for FakeConverter {
    async fn convert(&self, input: &Path, output: &Path, format: &str) -> Result<(), ConversionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            // A real converter may leave a partial file behind before failing.
            let _ = tokio::fs::write(output, b"partial").await;
            return Err(ConversionError::Failed {
                exit_code: Some(1),
                stderr: "Invalid data found when processing input".to_string(),
            });
        }
        let bytes = tokio::fs::read(input).await.unwrap();
        let mut converted = format!("{format}:").into_bytes();
        converted.extend(bytes);
        tokio::fs::write(output, converted).await.unwrap();
        Ok(())
    }
}

struct Fixture {
    dir: TempDir,
    repo: DbRepository,
    species_id: i64,
}

impl Fixture {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let provider = ConnectionProvider::new(&DatabaseSettings::sqlite(dir.path().join("froggy.db"))).unwrap();
        run_migrations(&provider).await.unwrap();
        let repo = DbRepository::new(provider);
        let species_id = repo
            .insert_species(&NewSpecies {
                name: "Gray Tree Frog".to_string(),
                scientific_name: "Hyla versicolor".to_string(),
                description: None,
                habitat: None,
                region: None,
                conservation_status: ConservationStatus::LeastConcern,
                image_url: None,
                size_cm: None,
                lifespan_years: None,
                diet: None,
                color: None,
                vocalization_description: None,
                vocalization_url: None,
            })
            .await
            .unwrap();
        Self { dir, repo, species_id }
    }

    fn audio_root(&self) -> PathBuf {
        self.dir.path().join("audio")
    }

    fn settings(&self, convert_to: Option<&str>) -> AssetSettings {
        AssetSettings {
            audio_root: self.audio_root(),
            convert_to: convert_to.map(str::to_string),
            converter_program: "ffmpeg".to_string(),
        }
    }

    fn fetcher(&self, convert_to: Option<&str>, downloader: FakeDownloader, converter: FakeConverter) -> AssetFetcher {
        AssetFetcher::new(
            self.repo.clone(),
            &self.settings(convert_to),
            Box::new(downloader),
            Box::new(converter),
        )
    }

    fn asset(&self, url: &str) -> CallAsset {
        CallAsset {
            species_id: self.species_id,
            species_name: "Gray Tree Frog".to_string(),
            url: url.to_string(),
            description: Some("Melodic trill".to_string()),
        }
    }

    /// Every regular file under the audio root, temporaries included.
    fn files(&self) -> Vec<PathBuf> {
        fn walk(dir: &Path, out: &mut Vec<PathBuf>) {
            let Ok(entries) = std::fs::read_dir(dir) else { return };
            for entry in entries {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    walk(&path, out);
                } else {
                    out.push(path);
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.audio_root(), &mut out);
        out
    }
}

#[tokio::test]
async fn second_fetch_downloads_nothing_and_returns_the_same_path() {
    let fx = Fixture::new().await;
    let downloader = FakeDownloader::default();
    let fetcher = fx.fetcher(Some("mp3"), downloader.clone(), FakeConverter::default());
    let asset = fx.asset("https://example.org/calls/gray.mp3");

    let first = fetcher.fetch_call(&asset).await.unwrap();
    assert_eq!(first.status, FetchStatus::Fetched);
    assert_eq!(downloader.calls.load(Ordering::SeqCst), 1);
    assert!(first.path.starts_with(fx.audio_root().join(fx.species_id.to_string())));
    assert_eq!(fx.files(), vec![first.path.clone()]);

    let second = fetcher.fetch_call(&asset).await.unwrap();
    assert_eq!(second.status, FetchStatus::AlreadyPresent);
    assert_eq!(second.path, first.path);
    assert_eq!(second.call_id, first.call_id);
    assert_eq!(downloader.calls.load(Ordering::SeqCst), 1);

    let call = fx.repo.get_call(first.call_id).await.unwrap().unwrap();
    assert!(call.local_file);
    assert_eq!(call.audio_url, first.path.to_string_lossy());
    assert_eq!(call.description.as_deref(), Some("Melodic trill"));
    assert_eq!(fx.repo.count_calls().await.unwrap(), 1);
}

#[tokio::test]
async fn orphaned_file_gets_its_call_row_without_a_download() {
    let fx = Fixture::new().await;
    let downloader = FakeDownloader::default();
    let fetcher = fx.fetcher(Some("mp3"), downloader.clone(), FakeConverter::default());
    let asset = fx.asset("https://example.org/calls/gray.mp3");

    let target = fetcher.target_path(&asset);
    std::fs::create_dir_all(target.parent().unwrap()).unwrap();
    std::fs::write(&target, b"left over from an interrupted run").unwrap();

    let outcome = fetcher.fetch_call(&asset).await.unwrap();
    assert_eq!(outcome.status, FetchStatus::AlreadyPresent);
    assert_eq!(downloader.calls.load(Ordering::SeqCst), 0);
    assert!(fx.repo.get_call(outcome.call_id).await.unwrap().is_some());
}

#[tokio::test]
async fn failed_download_leaves_no_file_and_no_row() {
    let fx = Fixture::new().await;
    let downloader = FakeDownloader {
        fail_when_url_contains: Some("missing"),
        ..FakeDownloader::default()
    };
    let fetcher = fx.fetcher(Some("mp3"), downloader, FakeConverter::default());

    let err = fetcher
        .fetch_call(&fx.asset("https://example.org/missing.mp3"))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Download(DownloadError::Status { status: 404, .. })));
    assert!(fx.files().is_empty());
    assert_eq!(fx.repo.count_calls().await.unwrap(), 0);
}

#[tokio::test]
async fn other_formats_are_converted_to_the_target_format() {
    let fx = Fixture::new().await;
    let converter = FakeConverter::default();
    let fetcher = fx.fetcher(Some("mp3"), FakeDownloader::default(), converter.clone());

    let outcome = fetcher
        .fetch_call(&fx.asset("https://upload.example.org/Hyla_versicolor.ogg"))
        .await
        .unwrap();

    assert_eq!(converter.calls.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.path.extension().unwrap(), "mp3");
    let contents = std::fs::read_to_string(&outcome.path).unwrap();
    assert!(contents.starts_with("mp3:audio from"));
    // The downloaded original is gone; only the converted file remains.
    assert_eq!(fx.files(), vec![outcome.path]);
}

#[tokio::test]
async fn conversion_failure_leaves_no_partial_file_and_no_row() {
    let fx = Fixture::new().await;
    let converter = FakeConverter {
        fail: true,
        ..FakeConverter::default()
    };
    let fetcher = fx.fetcher(Some("mp3"), FakeDownloader::default(), converter);

    let err = fetcher
        .fetch_call(&fx.asset("https://upload.example.org/corrupt.ogg"))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Conversion(ConversionError::Failed { exit_code: Some(1), .. })));
    assert!(fx.files().is_empty());
    assert_eq!(fx.repo.count_calls().await.unwrap(), 0);
}

#[tokio::test]
async fn without_conversion_the_source_format_is_kept() {
    let fx = Fixture::new().await;
    let converter = FakeConverter::default();
    let fetcher = fx.fetcher(None, FakeDownloader::default(), converter.clone());

    let outcome = fetcher
        .fetch_call(&fx.asset("https://upload.example.org/Hyla_versicolor.ogg"))
        .await
        .unwrap();

    assert_eq!(outcome.path.extension().unwrap(), "ogg");
    assert_eq!(converter.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_species_is_rejected_before_downloading() {
    let fx = Fixture::new().await;
    let downloader = FakeDownloader::default();
    let fetcher = fx.fetcher(Some("mp3"), downloader.clone(), FakeConverter::default());
    let asset = CallAsset {
        species_id: fx.species_id + 50,
        ..fx.asset("https://example.org/calls/gray.mp3")
    };

    let err = fetcher.fetch_call(&asset).await.unwrap_err();
    assert!(matches!(
        err,
        FetchError::Database(DbError::Validation(ValidationError::UnknownSpecies(_)))
    ));
    assert_eq!(downloader.calls.load(Ordering::SeqCst), 0);
    assert!(fx.files().is_empty());
}

#[tokio::test]
async fn catalog_fetch_continues_past_failures_and_is_idempotent() {
    let fx = Fixture::new().await;
    for url in [
        "https://example.org/a.mp3",
        "https://example.org/missing.mp3",
        "https://example.org/b.ogg",
    ] {
        fx.repo.insert_call(&NewCall::remote(fx.species_id, url)).await.unwrap();
    }
    let downloader = FakeDownloader {
        fail_when_url_contains: Some("missing"),
        ..FakeDownloader::default()
    };
    let fetcher = fx.fetcher(Some("mp3"), downloader.clone(), FakeConverter::default());

    let first = fetcher.fetch_catalog().await.unwrap();
    assert_eq!((first.fetched, first.already_present, first.failed), (2, 0, 1));
    assert_eq!(fx.files().len(), 2);

    let second = fetcher.fetch_catalog().await.unwrap();
    assert_eq!((second.fetched, second.already_present, second.failed), (0, 2, 1));
    // Only the missing asset was requested again.
    assert_eq!(downloader.calls.load(Ordering::SeqCst), 4);
    // Three remote rows plus two local ones.
    assert_eq!(fx.repo.count_calls().await.unwrap(), 5);
}

async fn serve_calls() -> String {
    use axum::{Router, routing::get};

    let app = Router::new().route("/calls/peeper.mp3", get(|| async { "ID3 spring peeper" }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn http_downloader_writes_the_body_and_rejects_error_statuses() {
    let base = serve_calls().await;
    let downloader = HttpDownloader::new(&HttpSettings::default()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("peeper.mp3");

    let written = downloader
        .download(&format!("{base}/calls/peeper.mp3"), &dest)
        .await
        .unwrap();
    assert_eq!(written, "ID3 spring peeper".len() as u64);
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "ID3 spring peeper");

    let err = downloader
        .download(&format!("{base}/calls/missing.mp3"), &dir.path().join("missing.mp3"))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Download(DownloadError::Status { status: 404, .. })));
    assert!(!dir.path().join("missing.mp3").exists());
}

#[tokio::test]
async fn http_404_through_the_fetcher_leaves_nothing_behind() {
    let base = serve_calls().await;
    let fx = Fixture::new().await;
    let fetcher = AssetFetcher::new(
        fx.repo.clone(),
        &fx.settings(None),
        Box::new(HttpDownloader::new(&HttpSettings::default()).unwrap()),
        Box::new(FakeConverter::default()),
    );

    let err = fetcher
        .fetch_call(&fx.asset(&format!("{base}/calls/gone.mp3")))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Download(_)));
    assert!(fx.files().is_empty());

    let ok = fetcher
        .fetch_call(&fx.asset(&format!("{base}/calls/peeper.mp3")))
        .await
        .unwrap();
    assert_eq!(std::fs::read_to_string(&ok.path).unwrap(), "ID3 spring peeper");
}

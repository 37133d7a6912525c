use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use liaz_gallery_dl::command::{exit_code, is_cancellation, Commands, SOURCE_MARKER};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn image_reference(server: &MockServer, file: &str) -> String {
    let reference = format!(
        "{}/components/com_eventgallery/helpers/image.php?option=com_eventgallery&mode=uncrop&width=50&view=resizeimage&folder=LIAZ%20Dakar%2090&file={}",
        server.uri(),
        file
    );
    urlencoding::encode(&reference).into_owned()
}

fn album_page(server: &MockServer, files: &[&str]) -> String {
    let mut html = String::from("<html><body><div class=\"thumbnails\">");
    for file in files {
        html.push_str(&format!(
            "<a href=\"#\"><img src=\"thumb.jpg\" longdesc=\"{}\"></a>",
            image_reference(server, file)
        ));
    }
    html.push_str("<img src=\"logo.png\" longdesc=\"\"></div></body></html>");
    html
}

fn write_config(dir: &Path, server: &MockServer, parallel: bool, workers: usize, albums: &[&str]) -> PathBuf {
    let mut yaml = format!(
        "use_parallel_downloading: {}\nmax_degree_of_parallelism: {}\noutput_directory: '{}'\nimage_endpoint: '{}/image.php'\nalbums:\n",
        parallel,
        workers,
        dir.join("out").display(),
        server.uri()
    );
    for album in albums {
        yaml.push_str(&format!("  '{}': '{}/{}.html'\n", album, server.uri(), album));
    }
    let config_path = dir.join("config.yaml");
    std::fs::write(&config_path, yaml).unwrap();
    config_path
}

async fn mount_album(server: &MockServer, album: &str, files: &[&str]) {
    Mock::given(method("GET"))
        .and(path(format!("/{}.html", album)))
        .respond_with(ResponseTemplate::new(200).set_body_string(album_page(server, files)))
        .mount(server)
        .await;
}

async fn run_download(config_path: &Path, cancel: CancellationToken) -> anyhow::Result<()> {
    Commands::Download { album: None }.run(config_path, cancel).await
}

#[tokio::test]
async fn downloads_every_described_image_into_album_directory() {
    let server = MockServer::start().await;
    mount_album(&server, "90", &["01.JPG", "02.jpg"]).await;
    Mock::given(method("GET"))
        .and(path("/image.php"))
        .and(query_param("mode", "full"))
        .and(query_param("view", "resizeimage"))
        .and(query_param("folder", "LIAZ Dakar 90"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFFu8; 4_096]))
        .expect(2)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path(), &server, true, 4, &["90"]);
    let result = run_download(&config_path, CancellationToken::new()).await;
    assert_eq!(exit_code(&result), 0);

    let album_dir = dir.path().join("out").join("LiazCamion-Liaz90");
    let marker = std::fs::read_to_string(album_dir.join(SOURCE_MARKER)).unwrap();
    assert_eq!(marker, format!("{}/90.html", server.uri()));
    assert_eq!(std::fs::read(album_dir.join("01.jpg")).unwrap().len(), 4_096);
    assert_eq!(std::fs::read(album_dir.join("02.jpg")).unwrap().len(), 4_096);
    server.verify().await;
}

#[tokio::test]
async fn second_run_does_not_refetch_saved_images() {
    let server = MockServer::start().await;
    mount_album(&server, "90", &["01.jpg", "02.jpg", "03.jpg"]).await;
    Mock::given(method("GET"))
        .and(path("/image.php"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 2_000]))
        .expect(3)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path(), &server, false, 2, &["90"]);
    run_download(&config_path, CancellationToken::new()).await.unwrap();
    run_download(&config_path, CancellationToken::new()).await.unwrap();

    let album_dir = dir.path().join("out").join("LiazCamion-Liaz90");
    let mut names: Vec<String> = std::fs::read_dir(&album_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["01.jpg", "02.jpg", "03.jpg", SOURCE_MARKER]);
    server.verify().await;
}

#[tokio::test]
async fn serial_and_parallel_modes_leave_the_same_files() {
    let mut listings = Vec::new();
    for parallel in [false, true] {
        let server = MockServer::start().await;
        mount_album(&server, "88", &["a.jpg", "B.jpg", "c.JPG", "tiny.jpg"]).await;
        Mock::given(method("GET"))
            .and(path("/image.php"))
            .and(query_param("file", "tiny.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not found"))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/image.php"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![2u8; 1_200]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config_path = write_config(dir.path(), &server, parallel, 3, &["88"]);
        run_download(&config_path, CancellationToken::new()).await.unwrap();

        let album_dir = dir.path().join("out").join("LiazCamion-Liaz88");
        let mut names: Vec<String> = std::fs::read_dir(&album_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        listings.push(names);
    }
    assert_eq!(listings[0], vec![SOURCE_MARKER, "a.jpg", "b.jpg", "c.jpg"]);
    assert_eq!(listings[0], listings[1]);
}

#[tokio::test]
async fn parallel_downloads_are_bounded_by_worker_count() {
    let server = MockServer::start().await;
    let files = ["1.jpg", "2.jpg", "3.jpg", "4.jpg", "5.jpg", "6.jpg"];
    mount_album(&server, "90", &files).await;
    Mock::given(method("GET"))
        .and(path("/image.php"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![3u8; 1_000])
                .set_delay(Duration::from_millis(200)),
        )
        .expect(6)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path(), &server, true, 2, &["90"]);
    let started = Instant::now();
    run_download(&config_path, CancellationToken::new()).await.unwrap();

    // 6 张图, 2 个并发, 每张 200ms
    assert!(started.elapsed() >= Duration::from_millis(600));
    server.verify().await;
}

#[tokio::test]
async fn failed_album_does_not_stop_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/90.html"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    mount_album(&server, "91", &["x.jpg"]).await;
    Mock::given(method("GET"))
        .and(path("/image.php"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![4u8; 1_500]))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path(), &server, true, 2, &["90", "91"]);
    let result = run_download(&config_path, CancellationToken::new()).await;
    assert_eq!(exit_code(&result), 0);

    let out = dir.path().join("out");
    assert!(out.join("LiazCamion-Liaz90").join(SOURCE_MARKER).exists());
    assert!(out.join("LiazCamion-Liaz91").join("x.jpg").exists());
    server.verify().await;
}

#[tokio::test]
async fn invalid_config_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    for workers in [1, 101] {
        let config_path = write_config(dir.path(), &server, true, workers, &["90"]);
        let result = run_download(&config_path, CancellationToken::new()).await;
        assert_eq!(exit_code(&result), 1);
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("max_degree_of_parallelism"), "{}", message);
    }
    assert!(!dir.path().join("out").exists());
    server.verify().await;
}

#[tokio::test]
async fn cancellation_mid_run_is_a_clean_stop() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/90.html"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<img longdesc=\"http://x/image.php?file=1.jpg\">")
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path(), &server, true, 4, &["90", "91"]);
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();
    });

    let started = Instant::now();
    let result = run_download(&config_path, cancel).await;
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(is_cancellation(result.as_ref().unwrap_err()));
    assert_eq!(exit_code(&result), 0);

    let out = dir.path().join("out");
    assert!(out.join("LiazCamion-Liaz90").join(SOURCE_MARKER).exists());
    assert!(!out.join("LiazCamion-Liaz91").exists());
}

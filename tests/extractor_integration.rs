//! Provider extractors against mocked provider pages.

use std::time::Duration;

use animedl_core::extractor::{
    FourSharedExtractor, GoogleDriveExtractor, Mp4UploadExtractor, SolidfilesExtractor,
};
use animedl_core::{ExtractionStrategy, HostExtractor, HostKind, ResolveError};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

const DRIVE_URL: &str = "https://drive.google.com/file/d/1AbCdEf/view?usp=sharing";

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html; charset=utf-8")
}

async fn mount_drive(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/uc"))
        .and(query_param("id", "1AbCdEf"))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_drive_small_file_is_served_from_template_url() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_drive(
        &server,
        ResponseTemplate::new(200).set_body_raw(vec![0_u8; 64], "video/mp4"),
    )
    .await;

    let extractor = GoogleDriveExtractor::with_base_url(None, false, &server.uri()).unwrap();
    let link = extractor.extract(DRIVE_URL).await.unwrap();
    assert_eq!(link.strategy, ExtractionStrategy::UrlTemplate);
    assert_eq!(
        link.url,
        format!("{}/uc?id=1AbCdEf&export=download", server.uri())
    );
    assert_eq!(link.source_url, DRIVE_URL);
}

#[tokio::test]
async fn test_drive_virus_scan_page_yields_confirm_url() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_drive(
        &server,
        html(
            r#"<html><body>
            <span class="uc-name-size"><a href="/open?id=1AbCdEf">One Piece 01.mp4</a> (1.2G)</span>
            <a id="uc-download-link" href="/uc?export=download&amp;confirm=Xy_9&amp;id=1AbCdEf">Download anyway</a>
            </body></html>"#,
        ),
    )
    .await;

    let extractor = GoogleDriveExtractor::with_base_url(None, false, &server.uri()).unwrap();
    let link = extractor.extract(DRIVE_URL).await.unwrap();
    assert_eq!(link.strategy, ExtractionStrategy::PagePattern);
    assert_eq!(link.rule.as_deref(), Some("confirm_token"));
    assert_eq!(
        link.url,
        format!("{}/uc?export=download&confirm=Xy_9&id=1AbCdEf", server.uri())
    );
    assert_eq!(link.file_name.as_deref(), Some("One Piece 01.mp4"));
    assert_eq!(link.size_hint.as_deref(), Some("1.2G"));
}

#[tokio::test]
async fn test_drive_removed_file_is_invalid_link() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_drive(
        &server,
        html("<p>Sorry, the file you have requested does not exist.</p>"),
    )
    .await;

    let extractor = GoogleDriveExtractor::with_base_url(None, true, &server.uri()).unwrap();
    let err = extractor.extract(DRIVE_URL).await.unwrap_err();
    assert!(matches!(
        err,
        ResolveError::InvalidOrExpiredLink {
            host: HostKind::GoogleDrive,
            ..
        }
    ));
}

#[tokio::test]
async fn test_drive_quota_and_server_errors_are_retryable() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_drive(
        &server,
        html("<p>Too many users have viewed or downloaded this file recently.</p>"),
    )
    .await;
    let extractor = GoogleDriveExtractor::with_base_url(None, true, &server.uri()).unwrap();
    let err = extractor.extract(DRIVE_URL).await.unwrap_err();
    assert!(err.is_retryable(), "got: {err}");

    let Some(failing) = start_mock_server_or_skip().await else {
        return;
    };
    mount_drive(&failing, ResponseTemplate::new(503)).await;
    let extractor = GoogleDriveExtractor::with_base_url(None, true, &failing.uri()).unwrap();
    let err = extractor.extract(DRIVE_URL).await.unwrap_err();
    assert_eq!(err.kind_label(), "network_failure");
}

#[tokio::test]
async fn test_drive_url_without_file_id_is_rejected_without_request() {
    let extractor = GoogleDriveExtractor::with_base_url(None, true, "http://127.0.0.1:9").unwrap();
    let err = extractor
        .extract("https://drive.google.com/drive/folders")
        .await
        .unwrap_err();
    assert_eq!(err.kind_label(), "invalid_or_expired_link");
}

#[tokio::test]
async fn test_four_shared_free_page_hop_finds_link() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/video/Ab12Cd/ep01.html"))
        .respond_with(html(
            r#"<html><body><a class="freeDl" href="/download/free/Ab12Cd/ep01.html">Free Download</a></body></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/download/free/Ab12Cd/ep01.html"))
        .respond_with(html(
            r#"<script>var c = 20;</script>
            <a class="linkShowD" href="https://dc2.4shared.com/download/Ab12Cd/ep01.mp4?tsid=7">Download</a>"#,
        ))
        .mount(&server)
        .await;

    let extractor = FourSharedExtractor::with_base_url(None, false, &server.uri())
        .unwrap()
        .with_max_countdown(Duration::from_millis(10));
    let link = extractor
        .extract("https://www.4shared.com/video/Ab12Cd/ep01.html")
        .await
        .unwrap();
    assert_eq!(link.rule.as_deref(), Some("link_show"));
    assert_eq!(link.url, "https://dc2.4shared.com/download/Ab12Cd/ep01.mp4?tsid=7");
    assert_eq!(link.host, HostKind::FourShared);
}

#[tokio::test]
async fn test_four_shared_huge_countdown_is_capped() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/video/Ab12Cd/ep01.html"))
        .respond_with(html(
            r#"<a class="freeDl" href="/download/free/Ab12Cd/ep01.html">Free Download</a>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/download/free/Ab12Cd/ep01.html"))
        .respond_with(html(
            r#"<script>var c = 18446744073709551615;</script>
            <a class="linkShowD" href="https://dc2.4shared.com/download/Ab12Cd/ep01.mp4">Download</a>"#,
        ))
        .mount(&server)
        .await;

    let extractor = FourSharedExtractor::with_base_url(None, false, &server.uri())
        .unwrap()
        .with_max_countdown(Duration::from_millis(10));
    let link = extractor
        .extract("https://www.4shared.com/video/Ab12Cd/ep01.html")
        .await
        .unwrap();
    assert_eq!(link.url, "https://dc2.4shared.com/download/Ab12Cd/ep01.mp4");
}

#[tokio::test]
async fn test_four_shared_deleted_file_is_invalid_link() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/file/Ab12Cd/ep01.html"))
        .respond_with(html(
            "<h1>The file link that you requested is not valid.</h1>",
        ))
        .mount(&server)
        .await;

    let extractor = FourSharedExtractor::with_base_url(None, true, &server.uri()).unwrap();
    let err = extractor
        .extract("https://www.4shared.com/file/Ab12Cd/ep01.html")
        .await
        .unwrap_err();
    assert_eq!(err.kind_label(), "invalid_or_expired_link");
}

#[tokio::test]
async fn test_solidfiles_viewer_options_yield_download_url() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/v/aBc123"))
        .respond_with(html(
            r#"<script>viewerOptions = {"name":"[Sub] One Piece - 01.mp4","streamUrl":"https://s.solidfilesusercontent.com/stream/x","downloadUrl":"https:\/\/s.solidfilesusercontent.com\/dl\/x\/ep01.mp4"};</script>"#,
        ))
        .mount(&server)
        .await;

    let extractor = SolidfilesExtractor::with_base_url(None, false, &server.uri()).unwrap();
    let link = extractor
        .extract("https://www.solidfiles.com/v/aBc123")
        .await
        .unwrap();
    assert_eq!(link.strategy, ExtractionStrategy::PagePattern);
    assert_eq!(link.url, "https://s.solidfilesusercontent.com/dl/x/ep01.mp4");
    assert_eq!(link.file_name.as_deref(), Some("[Sub] One Piece - 01.mp4"));
}

#[tokio::test]
async fn test_solidfiles_relative_download_url_is_made_absolute() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/v/aBc123"))
        .respond_with(html(
            r#"<script>viewerOptions = {"name":"ep01.mp4","downloadUrl":"\/dl\/aBc123\/ep01.mp4"};</script>"#,
        ))
        .mount(&server)
        .await;

    let extractor = SolidfilesExtractor::with_base_url(None, false, &server.uri()).unwrap();
    let link = extractor
        .extract("https://www.solidfiles.com/v/aBc123")
        .await
        .unwrap();
    assert_eq!(link.strategy, ExtractionStrategy::PagePattern);
    assert_eq!(link.url, format!("{}/dl/aBc123/ep01.mp4", server.uri()));
}

#[tokio::test]
async fn test_mp4upload_file_page_falls_through_to_embed_player() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/a1b2c3d4e5f6"))
        .respond_with(html("<h2>One_Piece_01.mp4</h2><p>Watch online</p>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/embed-a1b2c3d4e5f6.html"))
        .respond_with(html(
            r#"<div id="player"></div><script>player.src({type: "video/mp4", src: "https://s3.mp4upload.com:183/d/xyz/video.mp4"});</script>"#,
        ))
        .mount(&server)
        .await;

    let extractor = Mp4UploadExtractor::with_base_url(None, false, &server.uri()).unwrap();
    let link = extractor
        .extract("https://www.mp4upload.com/a1b2c3d4e5f6")
        .await
        .unwrap();
    assert_eq!(link.host, HostKind::Mp4Upload);
    assert_eq!(link.rule.as_deref(), Some("player_src"));
    assert_eq!(link.url, "https://s3.mp4upload.com:183/d/xyz/video.mp4");
    assert_eq!(link.source_url, "https://www.mp4upload.com/a1b2c3d4e5f6");
}

#[tokio::test]
async fn test_mp4upload_without_player_uses_direct_fallback_or_misses() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/embed-a1b2c3d4e5f6.html"))
        .respond_with(html("<p>Loading...</p>"))
        .mount(&server)
        .await;
    let url = "https://www.mp4upload.com/embed-a1b2c3d4e5f6.html";

    let fallback = Mp4UploadExtractor::with_base_url(None, true, &server.uri()).unwrap();
    let link = fallback.extract(url).await.unwrap();
    assert_eq!(link.strategy, ExtractionStrategy::DirectFallback);
    assert_eq!(link.url, url);

    let strict = Mp4UploadExtractor::with_base_url(None, false, &server.uri()).unwrap();
    let err = strict.extract(url).await.unwrap_err();
    assert_eq!(err.kind_label(), "extraction_pattern_miss");
}

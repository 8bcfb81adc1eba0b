use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use swatchwork::compose::composer::encode_png;
use swatchwork::compose::{ComposeOptions, ImageComposer, LayerStatus};
use swatchwork::contract::{AssetFetcher, BoxError, MockRenderUploader};
use swatchwork::error::RenderError;
use swatchwork::model::{CanvasSize, Layer, LayerCustomization, LayerType};
use swatchwork::render::{RenderRequest, RenderService, RenderSettings};
use swatchwork::storage::DirectoryUploader;

struct Assets(HashMap<String, Vec<u8>>);

#[async_trait]
impl AssetFetcher for Assets {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, BoxError> {
        self.0.get(url).cloned().ok_or_else(|| format!("404 for {url}").into())
    }
}

fn assets() -> Assets {
    let mut map = HashMap::new();
    map.insert(
        "mem://tees/boxy/0.png".to_string(),
        encode_png(&RgbaImage::from_pixel(32, 16, Rgba([255, 255, 255, 255]))).unwrap(),
    );
    map.insert(
        "mem://textures/1.png".to_string(),
        encode_png(&RgbaImage::from_pixel(4, 4, Rgba([10, 120, 10, 255]))).unwrap(),
    );
    Assets(map)
}

fn customization(layer_index: u32, pattern_url: &str) -> LayerCustomization {
    LayerCustomization {
        layer_index,
        pattern_id: "1".into(),
        pattern_url: pattern_url.into(),
        pattern_name: "1".into(),
    }
}

fn request() -> RenderRequest {
    RenderRequest {
        item_id: "tees-boxy".into(),
        collection_id: "tees".into(),
        customizations: vec![customization(0, "mem://textures/1.png")],
        layers: vec![Layer {
            index: 0,
            file: "0.png".into(),
            url: "mem://tees/boxy/0.png".into(),
            layer_type: LayerType::Pattern,
        }],
        width: Some(32),
        height: Some(16),
    }
}

fn service(uploader: MockRenderUploader) -> RenderService {
    let composer = ImageComposer::new(Arc::new(assets()), ComposeOptions::default());
    RenderService::new(
        composer,
        Arc::new(uploader),
        RenderSettings {
            preview_max_edge: 8,
            ..Default::default()
        },
    )
}

#[tokio::test]
async fn render_uploads_technical_plant_and_preview() {
    let mut uploader = MockRenderUploader::new();
    uploader
        .expect_upload()
        .withf(|key, bytes, content_type| {
            key.starts_with("renders/tees-boxy/") && !bytes.is_empty() && content_type.eq_ignore_ascii_case("image/png")
        })
        .times(2)
        .returning(|key, _, _| Ok(format!("https://cdn.test/{key}")));

    let response = service(uploader).render(&request()).await.expect("valid request");

    assert!(response.success, "render failed: {:?}", response.error);
    assert!(response.error.is_none());
    assert_eq!((response.width, response.height), (32, 16));
    assert!(response
        .technical_plant_url
        .as_deref()
        .is_some_and(|u| u.ends_with("-technical.png")));
    assert!(response
        .preview_url
        .as_deref()
        .is_some_and(|u| u.ends_with("-preview.png")));
    assert_eq!(
        response.layers[0].status,
        LayerStatus::Patterned { pattern_id: "1".into() }
    );
}

#[tokio::test]
async fn preview_is_downscaled_and_technical_plant_is_full_size() {
    let mut uploader = MockRenderUploader::new();
    uploader.expect_upload().times(2).returning(|key, bytes, _| {
        let img = image::load_from_memory(&bytes).unwrap();
        let expected = if key.ends_with("-preview.png") { (8, 4) } else { (32, 16) };
        assert_eq!((img.width(), img.height()), expected, "{key}");
        Ok(key.to_string())
    });

    let response = service(uploader).render(&request()).await.unwrap();
    assert!(response.success);
}

#[tokio::test]
async fn upload_failure_is_reported_in_response() {
    let mut uploader = MockRenderUploader::new();
    uploader
        .expect_upload()
        .returning(|_, _, _| Err("bucket is read-only".into()));

    let response = service(uploader).render(&request()).await.expect("not a validation error");

    assert!(!response.success);
    assert!(response.preview_url.is_none());
    let error = response.error.unwrap();
    assert!(error.contains("upload failed"), "{error}");
    assert!(error.contains("bucket is read-only"), "{error}");
}

#[tokio::test]
async fn invalid_requests_are_rejected_before_rendering() {
    let mut uploader = MockRenderUploader::new();
    uploader.expect_upload().never();
    let service = service(uploader);

    let mut no_customizations = request();
    no_customizations.customizations.clear();

    let mut duplicate = request();
    duplicate
        .customizations
        .push(customization(0, "mem://textures/2.png"));

    let mut empty_url = request();
    empty_url.customizations = vec![customization(0, " ")];

    let mut no_item = request();
    no_item.item_id = String::new();

    let mut no_layers = request();
    no_layers.layers.clear();

    let mut zero_width = request();
    zero_width.width = Some(0);

    let mut nested_item = request();
    nested_item.item_id = "tees/boxy".into();

    let mut parent_item = request();
    parent_item.item_id = "..".into();

    let mut control_item = request();
    control_item.item_id = "tees-boxy\n".into();

    for (name, req) in [
        ("no customizations", no_customizations),
        ("duplicate layer", duplicate),
        ("empty pattern url", empty_url),
        ("missing item", no_item),
        ("no layers", no_layers),
        ("zero width", zero_width),
        ("item id with separator", nested_item),
        ("item id with parent segment", parent_item),
        ("item id with control character", control_item),
    ] {
        let result = service.render(&req).await;
        assert!(
            matches!(result, Err(RenderError::Validation(_))),
            "{name} should be a validation error"
        );
    }
}

#[tokio::test]
async fn item_id_cannot_escape_output_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let composer = ImageComposer::new(Arc::new(assets()), ComposeOptions::default());
    let service = RenderService::new(
        composer,
        Arc::new(DirectoryUploader::new(tmp.path().join("out"))),
        RenderSettings::default(),
    );

    let mut req = request();
    req.item_id = "../../escaped".into();

    let result = service.render(&req).await;

    assert!(matches!(result, Err(RenderError::Validation(_))), "{result:?}");
    assert!(!tmp.path().join("escaped").exists());
    assert!(!tmp.path().join("out").exists());
}

#[test]
fn missing_dimensions_use_defaults() {
    let mut req = request();
    req.width = None;
    req.height = Some(300);

    let validated = req.validate(CanvasSize::new(2000, 2000), 8000).unwrap();
    assert_eq!(validated.canvas, CanvasSize::new(2000, 300));
}

#[test]
fn request_deserializes_from_json_body() {
    let body = r#"{
        "item_id": "tees-boxy",
        "customizations": [
            {"layer_index": 1, "pattern_id": "7", "pattern_url": "https://cdn.test/textures/7.png"}
        ],
        "layers": [
            {"index": 1, "file": "1.png", "url": "https://cdn.test/tees/boxy/1.png", "type": "pattern"}
        ]
    }"#;

    let req: RenderRequest = serde_json::from_str(body).unwrap();
    assert_eq!(req.collection_id, "");
    assert_eq!(req.customizations[0].pattern_name, "");
    assert_eq!(req.layers[0].layer_type, LayerType::Pattern);
    assert!(req.width.is_none());
}

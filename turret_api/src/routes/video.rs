//! `GET /video`: a `multipart/x-mixed-replace` stream of JPEG parts
//! encoded from the Perception Loop's latest captured frame.

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderValue};
use axum::response::Response;
use futures_util::stream;
use image::{ImageBuffer, Rgb};
use turret_common::consts::VIDEO_STREAM_INTERVAL;

use crate::state::AppState;

const BOUNDARY: &str = "frame";

fn encode_jpeg(width: u32, height: u32, rgb: &[u8]) -> Option<Vec<u8>> {
    let image: ImageBuffer<Rgb<u8>, &[u8]> = ImageBuffer::from_raw(width, height, rgb)?;
    let mut buf = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buf);
    image.write_to(&mut cursor, image::ImageFormat::Jpeg).ok()?;
    Some(buf)
}

fn part(jpeg: Vec<u8>) -> Bytes {
    let mut out = Vec::with_capacity(jpeg.len() + 64);
    out.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
            jpeg.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(&jpeg);
    out.extend_from_slice(b"\r\n");
    Bytes::from(out)
}

pub async fn video(State(state): State<AppState>) -> Response {
    let stream = stream::unfold(state, |state| async move {
        tokio::time::sleep(VIDEO_STREAM_INTERVAL).await;
        let Some(frame) = state.perception.latest_frame() else {
            return Some((Ok::<_, std::io::Error>(Bytes::new()), state));
        };
        let Some(jpeg) = encode_jpeg(frame.width, frame.height, &frame.rgb) else {
            return Some((Ok(Bytes::new()), state));
        };
        Some((Ok(part(jpeg)), state))
    });

    Response::builder()
        .header(
            header::CONTENT_TYPE,
            HeaderValue::from_str(&format!("multipart/x-mixed-replace; boundary={BOUNDARY}"))
                .unwrap(),
        )
        .header(header::CONNECTION, "close")
        .body(Body::from_stream(stream))
        .unwrap()
}

//! End-to-end tests: loopback servers standing in for the camera endpoints,
//! real sources reading from them, and the motion filter on the result.

use std::io::{Cursor, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use image::{GrayImage, ImageFormat};

use frame_motion::ingest::http::{HttpConfig, HttpSource};
use frame_motion::{detect_motion, open_source, FrameSource, SourceKind, SourceSettings, MASK_ON};

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;

/// 8-bit BMP with a 256-entry grayscale palette, rows stored bottom-up.
fn gray_bmp(width: u32, height: u32, pixel: impl Fn(u32, u32) -> u8) -> Vec<u8> {
    let stride = (width as usize + 3) & !3;
    let pixel_bytes = stride * height as usize;
    let offset = 14 + 40 + 256 * 4;
    let file_size = offset + pixel_bytes;

    let mut out = Vec::with_capacity(file_size);
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&(file_size as u32).to_le_bytes());
    out.extend_from_slice(&[0u8; 4]);
    out.extend_from_slice(&(offset as u32).to_le_bytes());

    out.extend_from_slice(&40u32.to_le_bytes());
    out.extend_from_slice(&(width as i32).to_le_bytes());
    out.extend_from_slice(&(height as i32).to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&8u16.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(pixel_bytes as u32).to_le_bytes());
    out.extend_from_slice(&3780u32.to_le_bytes());
    out.extend_from_slice(&3780u32.to_le_bytes());
    out.extend_from_slice(&256u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());

    for level in 0..=255u8 {
        out.extend_from_slice(&[level, level, level, 0]);
    }
    for y in (0..height).rev() {
        for x in 0..width {
            out.push(pixel(x, y));
        }
        out.extend(std::iter::repeat(0u8).take(stride - width as usize));
    }
    out
}

fn gradient(_x: u32, y: u32) -> u8 {
    y as u8
}

fn gradient_with_block(x: u32, y: u32) -> u8 {
    if (10..30).contains(&x) && (10..30).contains(&y) {
        255
    } else {
        gradient(x, y)
    }
}

fn read_http_request(stream: &mut TcpStream) {
    let mut request = Vec::new();
    let mut byte = [0u8; 1];
    while !request.ends_with(b"\r\n\r\n") {
        match stream.read(&mut byte) {
            Ok(0) | Err(_) => return,
            Ok(_) => request.push(byte[0]),
        }
    }
}

/// Serve each body once, in order, as a plain HTTP/1.1 response.
fn spawn_http_server(bodies: Vec<Vec<u8>>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind http listener");
    let addr = listener.local_addr().expect("local addr");
    thread::spawn(move || {
        for body in bodies {
            let (mut stream, _) = listener.accept().expect("accept");
            read_http_request(&mut stream);
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            stream.write_all(head.as_bytes()).expect("write head");
            stream.write_all(&body).expect("write body");
        }
    });
    format!("http://{}/", addr)
}

/// Answer each connection like the camera board: expect the token, then send
/// the header and BMP in several pieces with the terminator split in two.
fn spawn_board(payloads: Vec<Vec<u8>>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind board listener");
    let addr = listener.local_addr().expect("local addr");
    thread::spawn(move || {
        for payload in payloads {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut token = [0u8; 6];
            stream.read_exact(&mut token).expect("read token");
            assert_eq!(&token, b"GET /\n");

            stream
                .write_all(b"HTTP/1.1 200\nContent-Type: image/png\n")
                .expect("write header");
            stream.flush().expect("flush");
            thread::sleep(Duration::from_millis(20));

            let (first, rest) = payload.split_at(payload.len() / 3);
            stream.write_all(b"\n").expect("write terminator");
            stream.write_all(first).expect("write first part");
            stream.flush().expect("flush");
            thread::sleep(Duration::from_millis(20));
            stream.write_all(rest).expect("write rest");
        }
    });
    addr.to_string()
}

fn socket_settings(addr: String) -> SourceSettings {
    let mut settings = SourceSettings::for_kind(SourceKind::Socket);
    settings.url = addr;
    settings.width = WIDTH;
    settings.height = HEIGHT;
    settings
}

#[test]
fn socket_source_reassembles_flips_and_detects_motion() {
    let still = gray_bmp(WIDTH, HEIGHT, gradient);
    let moved = gray_bmp(WIDTH, HEIGHT, gradient_with_block);
    assert_eq!(still.len(), 1078 + (WIDTH * HEIGHT) as usize);

    let addr = spawn_board(vec![still.clone(), still, moved]);
    let mut source = open_source(&socket_settings(addr)).expect("open socket source");
    source.connect().expect("connect");

    let first = source.grab().expect("grab").expect("frame");
    assert_eq!(first.dimensions(), (WIDTH, HEIGHT));
    // Flipped 180 degrees: the bottom row of the sensor lands on top.
    assert_eq!(first.get(0, 0), Some(239));
    assert_eq!(first.get(WIDTH - 1, HEIGHT - 1), Some(0));

    let second = source.grab().expect("grab").expect("frame");
    let still_mask = detect_motion(&first, &second).expect("mask");
    assert!(!still_mask.has_motion());

    let third = source.grab().expect("grab").expect("frame");
    let mask = detect_motion(&second, &third).expect("mask");
    assert!(mask.has_motion());
    assert_eq!(mask.get(300, 220), Some(MASK_ON));
    assert_eq!(mask.get(0, 0), Some(0));
    assert!(mask.values().iter().all(|&v| v == 0 || v == MASK_ON));

    let stats = source.stats();
    assert_eq!(stats.frames_captured, 3);
    assert!(source.is_healthy());
}

#[test]
fn socket_source_resizes_to_output_resolution() {
    let addr = spawn_board(vec![gray_bmp(WIDTH, HEIGHT, gradient)]);
    let mut settings = socket_settings(addr);
    settings.width = 960;
    settings.height = 720;

    let mut source = open_source(&settings).expect("open socket source");
    let frame = source.grab().expect("grab").expect("frame");
    assert_eq!(frame.dimensions(), (960, 720));
}

#[test]
fn socket_source_fails_when_board_is_unreachable() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr").to_string();
    drop(listener);

    let mut source = open_source(&socket_settings(addr)).expect("open socket source");
    assert!(source.grab().is_err());
    assert!(!source.is_healthy());
}

#[test]
fn http_source_decodes_each_snapshot() {
    let encode = |image: GrayImage| {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode png");
        bytes
    };
    let dark = encode(GrayImage::from_pixel(16, 16, image::Luma([20])));
    let bright = encode(GrayImage::from_pixel(16, 16, image::Luma([200])));

    let url = spawn_http_server(vec![dark, bright]);
    let mut source = HttpSource::new(HttpConfig::direct(&url)).expect("http source");

    let first = source.grab().expect("grab").expect("frame");
    assert_eq!(first.dimensions(), (16, 16));
    assert!(first.pixels().iter().all(|&p| p == 20));

    let second = source.grab().expect("grab").expect("frame");
    let mask = detect_motion(&first, &second).expect("mask");
    assert_eq!(mask.active_pixels(), 256);
    assert_eq!(source.stats().frames_captured, 2);
}

#[test]
fn http_source_rejects_undecodable_bodies() {
    let url = spawn_http_server(vec![b"definitely not an image".to_vec()]);
    let mut source = HttpSource::new(HttpConfig::proxy(&url)).expect("http source");
    assert!(source.grab().is_err());
    assert!(!source.is_healthy());
}

//! Windows implementation of screen sampling, via the GDI API.

use super::{check_region, grid_from_bgra};
use huewatch_core::{CaptureError, Color, PixelGrid, Point, Region, ScreenSampler};
use std::ptr;
use windows_sys::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC, GetDIBits,
    GetPixel, ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, CLR_INVALID,
    DIB_RGB_COLORS, RGBQUAD, SRCCOPY,
};

pub struct GdiSampler;

impl ScreenSampler for GdiSampler {
    fn capture(&self, region: &Region) -> Result<PixelGrid, CaptureError> {
        let (width, height) = check_region(region)?;
        capture_screen_rect(region.x, region.y, width, height)
    }

    fn sample_at(&self, point: Point) -> Result<Color, CaptureError> {
        // Try the simple GetPixel approach first
        if let Some(color) = get_pixel_simple(point.x, point.y) {
            return Ok(color);
        }

        // Fall back to a 1x1 blit for DPI-scaled displays
        let grid = capture_screen_rect(point.x, point.y, 1, 1)?;
        grid.get(0, 0).ok_or_else(|| {
            CaptureError(format!("pixel read failed at {}/{}", point.x, point.y))
        })
    }
}

/// Simple GetPixel approach - fast but may fail on some displays.
fn get_pixel_simple(x: i32, y: i32) -> Option<Color> {
    unsafe {
        let hdc = GetDC(ptr::null_mut()); // null = entire screen
        if hdc.is_null() {
            return None;
        }

        let color = GetPixel(hdc, x, y);

        ReleaseDC(ptr::null_mut(), hdc);

        if color == CLR_INVALID {
            return None;
        }

        // COLORREF is 0x00BBGGRR
        let r = (color & 0xFF) as u8;
        let g = ((color >> 8) & 0xFF) as u8;
        let b = ((color >> 16) & 0xFF) as u8;

        Some(Color::new(r, g, b))
    }
}

/// Blit a screen rectangle into a memory bitmap and read it back as
/// 32-bit top-down BGRA.
fn capture_screen_rect(x: i32, y: i32, width: u32, height: u32) -> Result<PixelGrid, CaptureError> {
    unsafe {
        let hdc_screen = GetDC(ptr::null_mut());
        if hdc_screen.is_null() {
            return Err(CaptureError("GetDC failed".into()));
        }

        let hdc_mem = CreateCompatibleDC(hdc_screen);
        if hdc_mem.is_null() {
            ReleaseDC(ptr::null_mut(), hdc_screen);
            return Err(CaptureError("CreateCompatibleDC failed".into()));
        }

        let hbitmap = CreateCompatibleBitmap(hdc_screen, width as i32, height as i32);
        if hbitmap.is_null() {
            DeleteDC(hdc_mem);
            ReleaseDC(ptr::null_mut(), hdc_screen);
            return Err(CaptureError(format!(
                "CreateCompatibleBitmap failed for {}x{}",
                width, height
            )));
        }

        let old_bitmap = SelectObject(hdc_mem, hbitmap);

        let blitted = BitBlt(
            hdc_mem,
            0,
            0,
            width as i32,
            height as i32,
            hdc_screen,
            x,
            y,
            SRCCOPY,
        );

        let mut bmi = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: width as i32,
                biHeight: -(height as i32), // Top-down
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB,
                biSizeImage: 0,
                biXPelsPerMeter: 0,
                biYPelsPerMeter: 0,
                biClrUsed: 0,
                biClrImportant: 0,
            },
            bmiColors: [RGBQUAD {
                rgbBlue: 0,
                rgbGreen: 0,
                rgbRed: 0,
                rgbReserved: 0,
            }],
        };

        let mut data = vec![0u8; (width * height * 4) as usize];

        let rows = GetDIBits(
            hdc_mem,
            hbitmap,
            0,
            height,
            data.as_mut_ptr() as *mut _,
            &mut bmi,
            DIB_RGB_COLORS,
        );

        SelectObject(hdc_mem, old_bitmap);
        DeleteObject(hbitmap);
        DeleteDC(hdc_mem);
        ReleaseDC(ptr::null_mut(), hdc_screen);

        if blitted == 0 {
            return Err(CaptureError(format!(
                "BitBlt failed for {}/{} {}x{}",
                x, y, width, height
            )));
        }
        if rows == 0 {
            return Err(CaptureError("GetDIBits failed".into()));
        }

        grid_from_bgra(&data, width, height, width * 4)
    }
}

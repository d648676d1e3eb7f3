use crate::{
    core::Style,
    error::{PixelwaveError, PixelwaveResult},
};

/// Finalized mean color of one block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

#[derive(Clone, Copy, Debug, Default)]
struct BlockAcc {
    red: u64,
    green: u64,
    blue: u64,
    count: u64,
}

/// Sparse 2-D grid of averaged block colors, indexed block-column x block-row.
///
/// Cells no pixel contributed to stay absent; callers skip them rather than
/// treating absence as an error.
#[derive(Clone, Debug, Default)]
pub struct BlockGrid {
    cols: Vec<Vec<Option<BlockColor>>>,
}

impl BlockGrid {
    pub fn is_empty(&self) -> bool {
        self.cols.iter().all(|c| c.iter().all(Option::is_none))
    }

    pub fn get(&self, x: usize, y: usize) -> Option<BlockColor> {
        self.cols.get(x).and_then(|c| c.get(y)).copied().flatten()
    }

    /// Iterate populated cells in column-major order.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, BlockColor)> + '_ {
        self.cols.iter().enumerate().flat_map(|(x, col)| {
            col.iter()
                .enumerate()
                .filter_map(move |(y, cell)| cell.map(|c| (x, y, c)))
        })
    }
}

/// Partition a read-back RGBA8 buffer into blocks and average each block's
/// non-border pixels.
///
/// The sub-position used for border classification is `px % block_x`, modulus
/// by the *block index* rather than the block size. Border detection therefore
/// depends on which block a pixel is in; pixels in block column 0 (and row 0)
/// are never classified as border. This matches the long-standing shipped
/// behavior and is kept intentionally.
#[tracing::instrument(skip(pixels))]
pub fn average_blocks(
    pixels: &[u8],
    output_w: u32,
    output_h: u32,
    style: Style,
) -> PixelwaveResult<BlockGrid> {
    let expected = (output_w as usize) * (output_h as usize) * 4;
    if pixels.len() != expected {
        return Err(PixelwaveError::surface(format!(
            "pixel buffer is {} bytes, expected {} for {}x{} rgba8",
            pixels.len(),
            expected,
            output_w,
            output_h
        )));
    }

    let pitch_x = style.pitch_x();
    let pitch_y = style.pitch_y();
    if pitch_x == 0 || pitch_y == 0 || output_w == 0 {
        return Ok(BlockGrid::default());
    }

    let mut accs: Vec<Vec<Option<BlockAcc>>> = Vec::new();

    for (index, px_bytes) in pixels.chunks_exact(4).enumerate() {
        let py = index as u32 / output_w;
        let px = index as u32 % output_w;

        let block_x = px / pitch_x;
        let block_y = py / pitch_y;

        // Index-0 blocks never classify as border (see above).
        let border_x = block_x != 0 && px % block_x > style.pixel_width;
        let border_y = block_y != 0 && py % block_y > style.pixel_height;
        if border_x || border_y {
            continue;
        }

        let bx = block_x as usize;
        let by = block_y as usize;
        if accs.len() <= bx {
            accs.resize_with(bx + 1, Vec::new);
        }
        let col = &mut accs[bx];
        if col.len() <= by {
            col.resize_with(by + 1, || None);
        }
        let acc = col[by].get_or_insert_with(BlockAcc::default);
        acc.red += u64::from(px_bytes[0]);
        acc.green += u64::from(px_bytes[1]);
        acc.blue += u64::from(px_bytes[2]);
        acc.count += 1;
    }

    let cols = accs
        .into_iter()
        .map(|col| {
            col.into_iter()
                .map(|cell| {
                    cell.map(|acc| BlockColor {
                        red: (acc.red / acc.count) as u8,
                        green: (acc.green / acc.count) as u8,
                        blue: (acc.blue / acc.count) as u8,
                    })
                })
                .collect()
        })
        .collect();

    Ok(BlockGrid { cols })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_buffer(w: u32, h: u32, rgba: [u8; 4]) -> Vec<u8> {
        rgba.repeat((w * h) as usize)
    }

    fn style(pw: u32, ph: u32, b: u32) -> Style {
        Style {
            pixel_width: pw,
            pixel_height: ph,
            border_width: b,
        }
    }

    #[test]
    fn uniform_color_averages_exactly() {
        let buf = uniform_buffer(200, 100, [255, 0, 0, 255]);
        let grid = average_blocks(&buf, 200, 100, style(30, 30, 0)).unwrap();

        let mut cells = 0;
        for (_, _, c) in grid.cells() {
            assert_eq!(
                c,
                BlockColor {
                    red: 255,
                    green: 0,
                    blue: 0
                }
            );
            cells += 1;
        }
        // 200/30 -> block columns 0..=6, 100/30 -> block rows 0..=3.
        assert_eq!(cells, 7 * 4);
    }

    #[test]
    fn degenerate_block_size_populates_nothing() {
        let buf = uniform_buffer(8, 8, [10, 20, 30, 255]);
        let grid = average_blocks(&buf, 8, 8, style(0, 0, 0)).unwrap();
        assert!(grid.is_empty());
    }

    #[test]
    fn buffer_length_mismatch_is_an_error() {
        let err = average_blocks(&[0u8; 12], 2, 2, style(1, 1, 0)).unwrap_err();
        assert!(err.to_string().contains("surface error:"));
    }

    #[test]
    fn border_classification_follows_block_index_not_block_size() {
        // pixel_width 2, border 3 -> pitch 5. In block column 4 (px 20..24)
        // the index rule excludes only px 23 (23 % 4 = 3 > 2); px 24 sits in
        // the geometric gutter but has 24 % 4 = 0 and is averaged in.
        let mut buf = uniform_buffer(25, 1, [0, 0, 0, 255]);
        buf[24 * 4] = 100;
        let grid = average_blocks(&buf, 25, 1, style(2, 2, 3)).unwrap();

        let cell = grid.get(4, 0).unwrap();
        // Four contributing pixels (20, 21, 22, 24): floor(100 / 4).
        assert_eq!(cell.red, 25);
    }

    #[test]
    fn block_column_zero_is_never_border() {
        // In column 0 the whole pitch contributes, gutter included.
        let mut buf = uniform_buffer(5, 1, [0, 0, 0, 255]);
        buf[3 * 4 + 2] = 50;
        buf[4 * 4 + 2] = 50;
        let grid = average_blocks(&buf, 5, 1, style(2, 2, 3)).unwrap();

        let cell = grid.get(0, 0).unwrap();
        assert_eq!(cell.blue, 100 / 5);
    }
}

use log::warn;
#[cfg(feature = "ppu-trace")]
use log::trace;

use crate::{
    interrupts::Interrupt,
    mmu::{self, LcdToggle, Mmu},
};

// Screen resolution used by the Game Boy PPU
pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;

// Scanline timing in dots
const DOTS_PER_LINE: u16 = 456;
const OAM_SCAN_DOTS: u16 = 80;
const LCD_ON_FIRST_DOT: u16 = 4;
const DUMMY_FETCH_DOTS: u8 = 8;
const SPRITE_FETCH_DOTS: u8 = 6;
const FETCH_STEP_DOTS: u8 = 2;
/// LY reads 0 this many dots into line 153.
const LAST_LINE_LY_DOTS: u16 = 4;

const VBLANK_START_LINE: u8 = 144;
const LAST_LINE: u8 = 153;

// Sprite limits
const MAX_SPRITES_PER_LINE: usize = 10;
const TOTAL_SPRITES: u8 = 40;

const FIFO_DEPTH: usize = 8;

// LCDC bits
const LCDC_BG_ENABLE: u8 = 0x01;
const LCDC_OBJ_ENABLE: u8 = 0x02;
const LCDC_OBJ_TALL: u8 = 0x04;
const LCDC_BG_MAP: u8 = 0x08;
const LCDC_TILE_DATA: u8 = 0x10;
const LCDC_WINDOW_ENABLE: u8 = 0x20;
const LCDC_WINDOW_MAP: u8 = 0x40;

// STAT interrupt select bits
const STAT_HBLANK_SELECT: u8 = 0x08;
const STAT_VBLANK_SELECT: u8 = 0x10;
const STAT_OAM_SELECT: u8 = 0x20;
const STAT_LYC_SELECT: u8 = 0x40;

// OAM attribute bits
const ATTR_BG_PRIORITY: u8 = 0x80;
const ATTR_Y_FLIP: u8 = 0x40;
const ATTR_X_FLIP: u8 = 0x20;
const ATTR_PALETTE: u8 = 0x10;

/// The four DMG shades, lightest first, as 0x00RRGGBB.
pub const SHADES: [u32; 4] = [0x00FF_FFFF, 0x00AA_AAAA, 0x0055_5555, 0x0000_0000];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    HBlank,
    VBlank,
    OamScan,
    Drawing,
    /// First line after the LCD is switched on. Reads as mode 0.
    LcdTurnedOn,
}

impl Mode {
    /// Value reported in STAT bits 0-1.
    pub const fn stat_bits(self) -> u8 {
        match self {
            Mode::HBlank | Mode::LcdTurnedOn => 0,
            Mode::VBlank => 1,
            Mode::OamScan => 2,
            Mode::Drawing => 3,
        }
    }
}

/// OAM entry admitted to the current line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sprite {
    pub y: u8,
    pub x: u8,
    pub tile: u8,
    pub attrs: u8,
    pub oam_index: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct SpritePixel {
    color: u8,
    obp1: bool,
    bg_priority: bool,
}

/// Eight-slot pixel queue.
#[derive(Debug, Clone)]
struct PixelFifo<T> {
    slots: [T; FIFO_DEPTH],
    head: usize,
    len: usize,
}

impl<T: Copy + Default> PixelFifo<T> {
    fn new() -> Self {
        Self {
            slots: [T::default(); FIFO_DEPTH],
            head: 0,
            len: 0,
        }
    }

    fn push(&mut self, pixel: T) {
        debug_assert!(self.len < FIFO_DEPTH, "pixel FIFO overflow");
        self.slots[(self.head + self.len) % FIFO_DEPTH] = pixel;
        self.len += 1;
    }

    fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let pixel = self.slots[self.head];
        self.head = (self.head + 1) % FIFO_DEPTH;
        self.len -= 1;
        Some(pixel)
    }

    fn get_mut(&mut self, index: usize) -> &mut T {
        &mut self.slots[(self.head + index) % FIFO_DEPTH]
    }

    fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    fn len(&self) -> usize {
        self.len
    }

    fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchStep {
    TileNo,
    TileDataLow,
    TileDataHigh,
    PushToFifo,
}

/// Background/window tile fetcher.
#[derive(Debug, Clone, Copy)]
struct Fetcher {
    step: FetchStep,
    dots: u8,
    /// Tile column relative to the start of the background or window row.
    tile_x: u8,
    tile_no: u8,
    low: u8,
    high: u8,
    window: bool,
}

impl Fetcher {
    fn new() -> Self {
        Self {
            step: FetchStep::TileNo,
            dots: 0,
            tile_x: 0,
            tile_no: 0,
            low: 0,
            high: 0,
            window: false,
        }
    }
}

pub struct Ppu {
    mode: Mode,
    /// Internal line counter. The LY register follows it except on line 153.
    ly: u8,
    /// Dots elapsed on the current line, 1..=456 after the first tick.
    line_dots: u16,

    oam_entries_scanned: u8,
    sprites: [Sprite; MAX_SPRITES_PER_LINE],
    sprite_count: usize,
    next_sprite: usize,
    /// Dots spent so far on the in-flight sprite fetch.
    sprite_fetch: Option<u8>,

    bg_fifo: PixelFifo<u8>,
    sprite_fifo: PixelFifo<SpritePixel>,
    fetcher: Fetcher,
    dummy_fetch: u8,
    discard: u8,
    lx: u8,

    window_line: u8,
    window_drawn: bool,
    wy_latched: bool,

    stat_phase: u8,
    stat_line: bool,
    stat_irq_pending: bool,

    back_buffer: Vec<u32>,
    framebuffer: Vec<u32>,
    frame_ready: bool,
    frames: u64,
}

impl Ppu {
    pub fn new() -> Self {
        Self {
            mode: Mode::OamScan,
            ly: 0,
            line_dots: 0,
            oam_entries_scanned: 0,
            sprites: [Sprite::default(); MAX_SPRITES_PER_LINE],
            sprite_count: 0,
            next_sprite: 0,
            sprite_fetch: None,
            bg_fifo: PixelFifo::new(),
            sprite_fifo: PixelFifo::new(),
            fetcher: Fetcher::new(),
            dummy_fetch: 0,
            discard: 0,
            lx: 0,
            window_line: 0,
            window_drawn: false,
            wy_latched: false,
            stat_phase: 0,
            stat_line: false,
            stat_irq_pending: false,
            back_buffer: vec![SHADES[0]; SCREEN_WIDTH * SCREEN_HEIGHT],
            framebuffer: vec![SHADES[0]; SCREEN_WIDTH * SCREEN_HEIGHT],
            frame_ready: false,
            frames: 0,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn ly(&self) -> u8 {
        self.ly
    }

    pub fn line_dots(&self) -> u16 {
        self.line_dots
    }

    /// Sprites selected by the most recent OAM scan, in fetch order.
    pub fn sprite_buffer(&self) -> &[Sprite] {
        &self.sprites[..self.sprite_count]
    }

    pub fn window_line(&self) -> u8 {
        self.window_line
    }

    /// Last completed frame, row-major, `SCREEN_WIDTH * SCREEN_HEIGHT` pixels.
    pub fn framebuffer(&self) -> &[u32] {
        &self.framebuffer
    }

    pub fn frame_ready(&self) -> bool {
        self.frame_ready
    }

    /// Returns whether a frame completed since the last call, clearing the flag.
    pub fn take_frame_ready(&mut self) -> bool {
        std::mem::take(&mut self.frame_ready)
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Advance by one dot.
    pub fn tick(&mut self, mmu: &mut Mmu) {
        match mmu.take_lcd_toggle() {
            Some(LcdToggle::On) => self.lcd_on(mmu),
            Some(LcdToggle::Off) => self.lcd_off(mmu),
            None => {}
        }
        if !mmu.lcd_enabled() {
            return;
        }

        self.line_dots += 1;
        match self.mode {
            Mode::OamScan => self.oam_scan_dot(mmu),
            Mode::LcdTurnedOn => {
                if self.line_dots == OAM_SCAN_DOTS {
                    self.sprite_count = 0;
                    self.start_drawing(mmu);
                }
            }
            Mode::Drawing => self.drawing_dot(mmu),
            Mode::HBlank | Mode::VBlank => {}
        }

        if self.ly == LAST_LINE && self.line_dots == LAST_LINE_LY_DOTS {
            mmu.set_ly(0);
        }
        if self.line_dots == DOTS_PER_LINE {
            self.end_line(mmu);
        }

        if mmu.io(mmu::WY) == self.ly {
            self.wy_latched = true;
        }
        let coincidence = mmu.io(mmu::LY) == mmu.io(mmu::LYC);
        mmu.set_coincidence(coincidence);

        self.stat_phase = (self.stat_phase + 1) % 4;
        if self.stat_phase == 0 {
            self.update_stat_line(mmu, coincidence);
        }
    }

    fn enter(&mut self, mode: Mode, mmu: &mut Mmu) {
        #[cfg(feature = "ppu-trace")]
        trace!(
            "LY {:3} dot {:3}: {:?} -> {:?}",
            self.ly, self.line_dots, self.mode, mode
        );
        self.mode = mode;
        mmu.set_ppu_mode(mode);
    }

    fn lcd_on(&mut self, mmu: &mut Mmu) {
        self.ly = 0;
        self.line_dots = LCD_ON_FIRST_DOT;
        self.window_line = 0;
        self.window_drawn = false;
        self.wy_latched = false;
        self.stat_line = false;
        self.stat_irq_pending = false;
        mmu.set_ly(0);
        self.enter(Mode::LcdTurnedOn, mmu);
    }

    fn lcd_off(&mut self, mmu: &mut Mmu) {
        if self.mode != Mode::VBlank {
            warn!(
                "LCD switched off outside VBlank (mode {:?}, LY {}, dot {})",
                self.mode, self.ly, self.line_dots
            );
        }
        self.ly = 0;
        self.line_dots = 0;
        self.sprite_count = 0;
        self.sprite_fetch = None;
        self.window_drawn = false;
        self.bg_fifo.clear();
        self.sprite_fifo.clear();
        self.stat_line = false;
        self.stat_irq_pending = false;
        self.framebuffer.fill(SHADES[0]);
        mmu.set_ly(0);
        self.enter(Mode::HBlank, mmu);
    }

    fn oam_scan_dot(&mut self, mmu: &mut Mmu) {
        if self.line_dots % 2 == 1 {
            let index = self.oam_entries_scanned;
            self.oam_entries_scanned += 1;
            let base = index as usize * 4;
            let entry = &mmu.oam()[base..base + 4];
            let height: u16 = if mmu.io(mmu::LCDC) & LCDC_OBJ_TALL != 0 { 16 } else { 8 };
            let line = self.ly as u16 + 16;
            let top = entry[0] as u16;
            if self.sprite_count < MAX_SPRITES_PER_LINE && line >= top && line < top + height {
                self.sprites[self.sprite_count] = Sprite {
                    y: entry[0],
                    x: entry[1],
                    tile: entry[2],
                    attrs: entry[3],
                    oam_index: index,
                };
                self.sprite_count += 1;
            }
        }

        if self.line_dots == OAM_SCAN_DOTS {
            debug_assert_eq!(self.oam_entries_scanned, TOTAL_SPRITES);
            debug_assert!(self.sprite_count <= MAX_SPRITES_PER_LINE);
            // Stable sort keeps OAM order among equal x.
            self.sprites[..self.sprite_count].sort_by_key(|s| s.x);
            if mmu.dma_active() {
                self.sprite_count = 0;
            }
            self.start_drawing(mmu);
        }
    }

    fn start_drawing(&mut self, mmu: &mut Mmu) {
        self.bg_fifo.clear();
        self.sprite_fifo.clear();
        self.fetcher = Fetcher::new();
        self.next_sprite = 0;
        self.sprite_fetch = None;
        self.lx = 0;
        self.discard = mmu.io(mmu::SCX) % 8;
        // The dummy fetch begins on this dot.
        self.dummy_fetch = DUMMY_FETCH_DOTS - 1;
        self.enter(Mode::Drawing, mmu);
    }

    fn drawing_dot(&mut self, mmu: &mut Mmu) {
        if self.dummy_fetch > 0 {
            self.dummy_fetch -= 1;
            return;
        }
        let lcdc = mmu.io(mmu::LCDC);

        if !self.fetcher.window
            && lcdc & LCDC_WINDOW_ENABLE != 0
            && self.wy_latched
            && self.lx as u16 + 7 >= mmu.io(mmu::WX) as u16
        {
            self.start_window(mmu.io(mmu::WX));
        }

        if let Some(dots) = self.sprite_fetch {
            if dots + 1 == SPRITE_FETCH_DOTS {
                self.finish_sprite_fetch(mmu);
            } else {
                self.sprite_fetch = Some(dots + 1);
            }
            return;
        }

        let sprite_due = self.discard == 0
            && lcdc & LCDC_OBJ_ENABLE != 0
            && self
                .sprite_buffer()
                .get(self.next_sprite)
                .is_some_and(|s| s.x as u16 <= self.lx as u16 + 8);
        if sprite_due && !self.bg_fifo.is_empty() {
            self.sprite_fetch = Some(1);
            return;
        }

        self.step_fetcher(mmu, lcdc);
        if sprite_due {
            return;
        }
        self.output_pixel(mmu, lcdc);

        if self.lx as usize == SCREEN_WIDTH {
            self.bg_fifo.clear();
            self.sprite_fifo.clear();
            self.enter(Mode::HBlank, mmu);
        }
    }

    fn start_window(&mut self, wx: u8) {
        self.fetcher = Fetcher {
            window: true,
            ..Fetcher::new()
        };
        self.bg_fifo.clear();
        self.discard = 7u8.saturating_sub(wx);
        self.window_drawn = true;
    }

    fn step_fetcher(&mut self, mmu: &Mmu, lcdc: u8) {
        match self.fetcher.step {
            FetchStep::TileNo => {
                self.fetcher.dots += 1;
                if self.fetcher.dots == FETCH_STEP_DOTS {
                    self.fetcher.tile_no = mmu.vram(self.tile_map_addr(mmu, lcdc));
                    self.fetcher.dots = 0;
                    self.fetcher.step = FetchStep::TileDataLow;
                }
            }
            FetchStep::TileDataLow => {
                self.fetcher.dots += 1;
                if self.fetcher.dots == FETCH_STEP_DOTS {
                    self.fetcher.low = mmu.vram(self.tile_data_addr(mmu, lcdc));
                    self.fetcher.dots = 0;
                    self.fetcher.step = FetchStep::TileDataHigh;
                }
            }
            FetchStep::TileDataHigh => {
                self.fetcher.dots += 1;
                if self.fetcher.dots == FETCH_STEP_DOTS {
                    self.fetcher.high = mmu.vram(self.tile_data_addr(mmu, lcdc) + 1);
                    self.fetcher.dots = 0;
                    self.fetcher.step = FetchStep::PushToFifo;
                }
            }
            FetchStep::PushToFifo => {}
        }

        if self.fetcher.step == FetchStep::PushToFifo && self.bg_fifo.is_empty() {
            let (low, high) = (self.fetcher.low, self.fetcher.high);
            for bit in (0..8).rev() {
                self.bg_fifo.push(((high >> bit) & 1) << 1 | ((low >> bit) & 1));
            }
            self.fetcher.tile_x = self.fetcher.tile_x.wrapping_add(1);
            self.fetcher.step = FetchStep::TileNo;
        }
    }

    fn tile_map_addr(&self, mmu: &Mmu, lcdc: u8) -> u16 {
        let (map_select, column, row) = if self.fetcher.window {
            (
                LCDC_WINDOW_MAP,
                self.fetcher.tile_x,
                self.window_line / 8,
            )
        } else {
            (
                LCDC_BG_MAP,
                (mmu.io(mmu::SCX) / 8).wrapping_add(self.fetcher.tile_x),
                self.ly.wrapping_add(mmu.io(mmu::SCY)) / 8,
            )
        };
        let base: u16 = if lcdc & map_select != 0 { 0x9C00 } else { 0x9800 };
        base + (row as u16 & 0x1F) * 32 + (column as u16 & 0x1F)
    }

    fn tile_data_addr(&self, mmu: &Mmu, lcdc: u8) -> u16 {
        let row = if self.fetcher.window {
            self.window_line % 8
        } else {
            self.ly.wrapping_add(mmu.io(mmu::SCY)) % 8
        };
        let tile = self.fetcher.tile_no;
        let base = if lcdc & LCDC_TILE_DATA != 0 {
            0x8000 + tile as u16 * 16
        } else {
            0x9000u16.wrapping_add((tile as i8 as i16 * 16) as u16)
        };
        base + row as u16 * 2
    }

    fn finish_sprite_fetch(&mut self, mmu: &Mmu) {
        self.sprite_fetch = None;
        let sprite = self.sprites[self.next_sprite];
        self.next_sprite += 1;

        let tall = mmu.io(mmu::LCDC) & LCDC_OBJ_TALL != 0;
        let height: u8 = if tall { 16 } else { 8 };
        let mut row = (self.ly + 16).wrapping_sub(sprite.y) & (height - 1);
        if sprite.attrs & ATTR_Y_FLIP != 0 {
            row = height - 1 - row;
        }
        let tile = if tall { sprite.tile & 0xFE } else { sprite.tile };
        let addr = 0x8000 + tile as u16 * 16 + row as u16 * 2;
        let low = mmu.vram(addr);
        let high = mmu.vram(addr + 1);

        // Columns left of the screen edge are dropped.
        let skip = ((self.lx + 8).saturating_sub(sprite.x) as usize).min(FIFO_DEPTH);
        while self.sprite_fifo.len() < FIFO_DEPTH {
            self.sprite_fifo.push(SpritePixel::default());
        }
        for column in skip..FIFO_DEPTH {
            let bit = if sprite.attrs & ATTR_X_FLIP != 0 {
                column
            } else {
                7 - column
            };
            let color = ((high >> bit) & 1) << 1 | ((low >> bit) & 1);
            let slot = self.sprite_fifo.get_mut(column - skip);
            // An earlier sprite's opaque pixel keeps priority.
            if slot.color == 0 {
                *slot = SpritePixel {
                    color,
                    obp1: sprite.attrs & ATTR_PALETTE != 0,
                    bg_priority: sprite.attrs & ATTR_BG_PRIORITY != 0,
                };
            }
        }
    }

    fn output_pixel(&mut self, mmu: &Mmu, lcdc: u8) {
        let Some(bg) = self.bg_fifo.pop() else {
            return;
        };
        if self.discard > 0 {
            self.discard -= 1;
            return;
        }
        let sprite = self.sprite_fifo.pop();

        let bg = if lcdc & LCDC_BG_ENABLE != 0 { bg } else { 0 };
        let mut shade = if lcdc & LCDC_BG_ENABLE != 0 {
            palette_shade(mmu.io(mmu::BGP), bg)
        } else {
            0
        };
        if let Some(px) = sprite
            && lcdc & LCDC_OBJ_ENABLE != 0
            && px.color != 0
            && !(px.bg_priority && bg != 0)
        {
            let palette = mmu.io(if px.obp1 { mmu::OBP1 } else { mmu::OBP0 });
            shade = palette_shade(palette, px.color);
        }

        let index = self.ly as usize * SCREEN_WIDTH + self.lx as usize;
        self.back_buffer[index] = SHADES[shade as usize];
        self.lx += 1;
    }

    fn end_line(&mut self, mmu: &mut Mmu) {
        debug_assert!(self.mode != Mode::Drawing, "line ended while drawing");
        self.line_dots = 0;
        if std::mem::take(&mut self.window_drawn) {
            self.window_line = self.window_line.wrapping_add(1);
        }

        match self.ly {
            LAST_LINE => {
                self.ly = 0;
                self.window_line = 0;
                self.wy_latched = false;
                mmu.set_ly(0);
                self.begin_oam_scan(mmu);
            }
            ly if ly + 1 == VBLANK_START_LINE => {
                self.ly = VBLANK_START_LINE;
                mmu.set_ly(self.ly);
                self.framebuffer.copy_from_slice(&self.back_buffer);
                self.frame_ready = true;
                self.frames += 1;
                mmu.interrupts.request(Interrupt::VBlank);
                self.enter(Mode::VBlank, mmu);
            }
            ly if ly >= VBLANK_START_LINE => {
                self.ly += 1;
                mmu.set_ly(self.ly);
            }
            _ => {
                self.ly += 1;
                mmu.set_ly(self.ly);
                self.begin_oam_scan(mmu);
            }
        }
    }

    fn begin_oam_scan(&mut self, mmu: &mut Mmu) {
        self.sprite_count = 0;
        self.oam_entries_scanned = 0;
        self.enter(Mode::OamScan, mmu);
    }

    /// Sample the STAT interrupt line once per M-cycle. A rising edge raises
    /// the request on the following sample.
    fn update_stat_line(&mut self, mmu: &mut Mmu, coincidence: bool) {
        if std::mem::take(&mut self.stat_irq_pending) {
            mmu.interrupts.request(Interrupt::LcdStat);
        }
        let stat = mmu.io(mmu::STAT);
        let line = (stat & STAT_HBLANK_SELECT != 0 && self.mode.stat_bits() == 0)
            || (stat & STAT_VBLANK_SELECT != 0 && self.mode == Mode::VBlank)
            || (stat & STAT_OAM_SELECT != 0 && self.mode == Mode::OamScan)
            || (stat & STAT_LYC_SELECT != 0 && coincidence);
        if line && !self.stat_line {
            self.stat_irq_pending = true;
        }
        self.stat_line = line;
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn palette_shade(palette: u8, color: u8) -> u8 {
    (palette >> (color * 2)) & 0x03
}

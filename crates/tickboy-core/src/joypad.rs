const SELECT_DIRECTIONS: u8 = 0x10;
const SELECT_ACTIONS: u8 = 0x20;
const SELECT_MASK: u8 = SELECT_DIRECTIONS | SELECT_ACTIONS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Right,
    Left,
    Up,
    Down,
    A,
    B,
    Select,
    Start,
}

impl Button {
    fn is_direction(self) -> bool {
        matches!(self, Button::Right | Button::Left | Button::Up | Button::Down)
    }

    fn line(self) -> u8 {
        match self {
            Button::Right | Button::A => 0x01,
            Button::Left | Button::B => 0x02,
            Button::Up | Button::Select => 0x04,
            Button::Down | Button::Start => 0x08,
        }
    }
}

/// P1/JOYP register. Button state is stored active-high and inverted on read.
#[derive(Debug, Clone)]
pub struct Joypad {
    select: u8,
    directions: u8,
    actions: u8,
}

impl Joypad {
    pub fn new() -> Self {
        Self {
            select: SELECT_MASK,
            directions: 0,
            actions: 0,
        }
    }

    pub fn read(&self) -> u8 {
        0xC0 | self.select | (!self.selected_lines() & 0x0F)
    }

    pub fn write(&mut self, val: u8) {
        self.select = val & SELECT_MASK;
    }

    /// Update a button. Returns true when the change pulls a selected input
    /// line low, which requests the joypad interrupt.
    pub fn set_button(&mut self, button: Button, pressed: bool) -> bool {
        let before = self.selected_lines();
        let group = if button.is_direction() {
            &mut self.directions
        } else {
            &mut self.actions
        };
        if pressed {
            *group |= button.line();
        } else {
            *group &= !button.line();
        }
        let after = self.selected_lines();
        after & !before != 0
    }

    pub fn any_pressed(&self) -> bool {
        self.directions | self.actions != 0
    }

    fn selected_lines(&self) -> u8 {
        let mut lines = 0;
        if self.select & SELECT_DIRECTIONS == 0 {
            lines |= self.directions;
        }
        if self.select & SELECT_ACTIONS == 0 {
            lines |= self.actions;
        }
        lines
    }
}

impl Default for Joypad {
    fn default() -> Self {
        Self::new()
    }
}

use crate::interrupts::{Interrupt, InterruptController};

const SELECT_DIRECTIONS: u8 = 0x10;
const SELECT_ACTIONS: u8 = 0x20;

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
    /// Row select bit (P1 bit 4 or 5) and the line within that row.
    fn line(self) -> (u8, u8) {
        match self {
            Button::Right => (SELECT_DIRECTIONS, 0x01),
            Button::Left => (SELECT_DIRECTIONS, 0x02),
            Button::Up => (SELECT_DIRECTIONS, 0x04),
            Button::Down => (SELECT_DIRECTIONS, 0x08),
            Button::A => (SELECT_ACTIONS, 0x01),
            Button::B => (SELECT_ACTIONS, 0x02),
            Button::Select => (SELECT_ACTIONS, 0x04),
            Button::Start => (SELECT_ACTIONS, 0x08),
        }
    }
}

/// P1 register (0xFF00). Button lines are active low.
#[derive(Debug, Clone)]
pub struct Joypad {
    /// Pressed lines, active high internally.
    directions: u8,
    actions: u8,
    /// Bits 4 and 5 as last written by software.
    select: u8,
}

impl Joypad {
    pub fn new() -> Self {
        Self {
            directions: 0,
            actions: 0,
            select: SELECT_DIRECTIONS | SELECT_ACTIONS,
        }
    }

    pub fn read(&self) -> u8 {
        let mut pressed = 0;
        if self.select & SELECT_DIRECTIONS == 0 {
            pressed |= self.directions;
        }
        if self.select & SELECT_ACTIONS == 0 {
            pressed |= self.actions;
        }
        0xC0 | self.select | (!pressed & 0x0F)
    }

    pub fn write(&mut self, val: u8) {
        self.select = val & (SELECT_DIRECTIONS | SELECT_ACTIONS);
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        let (row, bit) = button.line();
        let state = if row == SELECT_DIRECTIONS {
            self.directions
        } else {
            self.actions
        };
        state & bit != 0
    }

    /// Update a button from the host. A fresh press requests the joypad
    /// interrupt.
    pub fn set_pressed(
        &mut self,
        button: Button,
        pressed: bool,
        interrupts: &mut InterruptController,
    ) {
        let was_pressed = self.is_pressed(button);
        let (row, bit) = button.line();
        let state = if row == SELECT_DIRECTIONS {
            &mut self.directions
        } else {
            &mut self.actions
        };
        if pressed {
            *state |= bit;
        } else {
            *state &= !bit;
        }
        if pressed && !was_pressed {
            interrupts.request(Interrupt::Joypad);
        }
    }
}

impl Default for Joypad {
    fn default() -> Self {
        Self::new()
    }
}

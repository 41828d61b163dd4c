// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
//! Per-process CLI session state.
use std::io;

use crate::progress::render_bar;

const BOOT_BAR_WIDTH: usize = 24;

/// Lines shown after the progress bar on first boot.
const BOOT_LINES: [&str; 7] = [
    "",
    "Initializing audio drivers... OK",
    "Loading pitch processor... OK",
    "Mapping keyboard... OK",
    "",
    "SYSTEM READY",
    "Press keys a-k to play, 'quit' to exit",
];

/// Carries whether the boot banner has been shown. Passed explicitly to
/// whatever prints it.
#[derive(Debug, Default)]
pub struct Session {
    booted: bool,
}

impl Session {
    pub fn new() -> Session {
        Session::default()
    }

    pub fn is_booted(&self) -> bool {
        self.booted
    }

    /// Writes the boot banner the first time it is called. Returns whether
    /// anything was written.
    pub fn boot<W: io::Write>(&mut self, mut writer: W) -> Result<bool, io::Error> {
        if self.booted {
            return Ok(false);
        }

        writeln!(writer, "SYNTH-OS v{} BOOTING...", env!("CARGO_PKG_VERSION"))?;
        writeln!(writer, "{}", render_bar(1.0, BOOT_BAR_WIDTH))?;
        for line in BOOT_LINES {
            writeln!(writer, "{}", line)?;
        }
        writer.flush()?;

        self.booted = true;
        Ok(true)
    }
}

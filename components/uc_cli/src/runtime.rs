//! Runtime orchestration for usecode execution
//!
//! The Runtime struct wires the components together: it reads an image
//! file, builds a machine from the configuration, starts the entry
//! function as the first kernel process and runs the kernel until
//! nothing is left to do.

use crate::error::{CliError, CliResult};
use bytecode_system::UsecodeImage;
use core_types::{ErrorKind, GameVariant, ProcId, UcError};
use interpreter::{ExecOutcome, MachineConfig, SpawnRequest, UcMachine};
use memory_manager::HeapStats;
use scheduler::Kernel;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// What happened to the entry process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Pid of the entry process
    pub pid: ProcId,
    /// How it ended; `None` when it was still alive at the tick limit
    pub outcome: Option<ExecOutcome>,
    /// Ticks the kernel ran
    pub ticks: u32,
    /// Strings and lists alive afterwards
    pub stats: HeapStats,
}

impl RunReport {
    /// Result register of a process that returned normally
    pub fn result(&self) -> Option<u32> {
        match self.outcome {
            Some(ExecOutcome::Terminated(result)) => Some(result),
            _ => None,
        }
    }
}

/// Runs usecode functions from image files
#[derive(Debug, Clone)]
pub struct Runtime {
    config: MachineConfig,
    max_ticks: u32,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Create a runtime with the default machine configuration
    ///
    /// # Example
    /// ```
    /// use uc_cli::Runtime;
    ///
    /// let runtime = Runtime::new().with_max_ticks(100);
    /// assert_eq!(runtime.max_ticks(), 100);
    /// ```
    pub fn new() -> Self {
        Self {
            config: MachineConfig::default(),
            max_ticks: 10_000,
        }
    }

    /// Use `config` for new machines
    pub fn with_config(mut self, config: MachineConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the game variant
    pub fn with_variant(mut self, variant: GameVariant) -> Self {
        self.config = self.config.with_variant(variant);
        self
    }

    /// Stop after `max_ticks` kernel ticks
    pub fn with_max_ticks(mut self, max_ticks: u32) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    /// Machine configuration in use
    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Tick limit
    pub fn max_ticks(&self) -> u32 {
        self.max_ticks
    }

    /// Read a JSON machine configuration
    pub fn load_config(path: impl AsRef<Path>) -> CliResult<MachineConfig> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Read an image file
    pub fn load_image(path: impl AsRef<Path>) -> CliResult<UsecodeImage> {
        let bytes = std::fs::read(path)?;
        Ok(UsecodeImage::from_bytes(&bytes)?)
    }

    /// Run `class_id:offset` from the image file at `path`
    ///
    /// # Errors
    /// Returns `CliError` if the file cannot be read or parsed, or the
    /// entry function cannot be started
    pub fn run_file(&self, path: impl AsRef<Path>, class_id: u16, offset: u16) -> CliResult<RunReport> {
        let image = Self::load_image(path)?;
        self.run_image(image, class_id, offset)
    }

    /// Run `class_id:offset` from `image` until the kernel is idle
    pub fn run_image(&self, image: UsecodeImage, class_id: u16, offset: u16) -> CliResult<RunReport> {
        if image.class(class_id).is_none() {
            return Err(UcError::new(
                ErrorKind::MissingClass,
                format!("image has no class {class_id:04X}"),
            )
            .into());
        }

        let mut machine = UcMachine::new(self.config.clone(), Arc::new(image));
        let mut kernel = Kernel::new();
        let request = SpawnRequest {
            class_id,
            offset,
            ..Default::default()
        };
        let pid = kernel.add_process(&machine, request);
        if pid == 0 {
            return Err(CliError::Spawn { class_id, offset });
        }

        let ticks = kernel.run_until_idle(&mut machine, self.max_ticks);
        let report = RunReport {
            pid,
            outcome: kernel.outcome(pid).cloned(),
            ticks,
            stats: machine.usecode_stats(),
        };
        info!(pid, ticks, outcome = ?report.outcome, "run finished");
        Ok(report)
    }

    /// Disassembly of one class of the image file at `path`
    pub fn disassemble_file(path: impl AsRef<Path>, class_id: u16) -> CliResult<Vec<String>> {
        let image = Self::load_image(path)?;
        let class = image.class(class_id).ok_or_else(|| {
            UcError::new(
                ErrorKind::MissingClass,
                format!("image has no class {class_id:04X}"),
            )
        })?;
        Ok(class.disassemble())
    }
}

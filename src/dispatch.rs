//! # Print Dispatch
//!
//! Turns a bitmap and [`Settings`] into command buffers and hands them to
//! the configured backend.
//!
//! ## Job Layout
//!
//! ```text
//! first chunk:  [ESC @]  [ESC S]  LF × lines_before
//! every chunk:  GS v 0 raster  (or ESC * bands)
//! last chunk:   LF × (5 + lines_after)  [ESC m]
//! ```
//!
//! Without split printing there is exactly one chunk carrying all three
//! parts. With split printing the image is cut into `split_height` row
//! strips, each sent as its own job with `split_delay` ms between them, so
//! printers with small buffers don't drop data. Strips shorter than
//! [`MIN_SPLIT_HEIGHT`] rows are refused, but only when the image is tall
//! enough to be split at all.
//!
//! Backends that print the bitmap itself ([`Printer::prints_bitmap`](crate::printer::Printer::prints_bitmap)) are
//! never split: they get the whole image and the whole job in one call.
//!
//! The dispatcher never retries. Backends that own a device session
//! handle their own reconnects.

use std::thread;
use std::time::Duration;

use log::{debug, info};

use crate::bitmap::Bitmap;
use crate::error::{PrintError, Result};
use crate::printer::PrinterRegistry;
use crate::protocol::commands::{self, DrawerPin};
use crate::protocol::{band, raster};
use crate::render::Renderer;
use crate::settings::{MIN_SPLIT_HEIGHT, Settings};

/// Stand-alone printer commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrinterCommand {
    /// Cut the paper
    Cut,
    /// Pulse cash drawer connector pin 2
    Drawer1,
    /// Pulse cash drawer connector pin 5
    Drawer2,
}

impl PrinterCommand {
    pub fn to_bytes(self) -> Vec<u8> {
        match self {
            PrinterCommand::Cut => commands::cut(),
            PrinterCommand::Drawer1 => commands::open_cash_drawer(DrawerPin::Pin2),
            PrinterCommand::Drawer2 => commands::open_cash_drawer(DrawerPin::Pin5),
        }
    }
}

/// Routes jobs to backends of a [`PrinterRegistry`].
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: PrinterRegistry,
}

impl Dispatcher {
    pub fn new(registry: PrinterRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &PrinterRegistry {
        &self.registry
    }

    /// Row strips to print, one per job.
    fn chunks(settings: &Settings, bitmap: &Bitmap) -> Result<Vec<Bitmap>> {
        let cmd = &settings.commands;
        if cmd.split_printing && bitmap.height() > cmd.split_height {
            if cmd.split_height < MIN_SPLIT_HEIGHT {
                return Err(PrintError::Config(format!(
                    "split height {} is below {} rows",
                    cmd.split_height, MIN_SPLIT_HEIGHT
                )));
            }
            bitmap.split_rows(cmd.split_height)
        } else {
            Ok(vec![bitmap.clone()])
        }
    }

    fn encode_chunk(settings: &Settings, chunk: &Bitmap, first: bool, last: bool) -> Result<Vec<u8>> {
        let cmd = &settings.commands;
        let mut buf = Vec::new();

        if first {
            if cmd.explicit_init {
                buf.extend(commands::init());
            }
            if cmd.force_standard_mode {
                buf.extend(commands::standard_mode());
            }
            buf.extend(commands::line_feeds(cmd.lines_before as usize));
        }

        if cmd.use_esc_star {
            band::write_bands(&mut buf, chunk)?;
        } else {
            raster::write_raster(&mut buf, chunk)?;
        }

        if last {
            buf.extend(commands::line_feeds(
                commands::TRAILING_FEED_LINES + cmd.lines_after as usize,
            ));
            if cmd.cut {
                buf.extend(commands::cut());
            }
        }

        Ok(buf)
    }

    fn encode_all(settings: &Settings, bitmap: &Bitmap) -> Result<Vec<(Bitmap, Vec<u8>)>> {
        settings.validate()?;
        let chunks = Self::chunks(settings, bitmap)?;
        let count = chunks.len();

        chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| {
                let buf = Self::encode_chunk(settings, &chunk, i == 0, i + 1 == count)?;
                Ok((chunk, buf))
            })
            .collect()
    }

    /// Command buffers for `bitmap`, one per chunk, without printing.
    pub fn build_commands(&self, settings: &Settings, bitmap: &Bitmap) -> Result<Vec<Vec<u8>>> {
        Ok(Self::encode_all(settings, bitmap)?
            .into_iter()
            .map(|(_, buf)| buf)
            .collect())
    }

    /// Print `bitmap` on the configured printer.
    pub fn print(&self, settings: &Settings, bitmap: &Bitmap) -> Result<()> {
        settings.validate()?;
        let printer = self.registry.get(&settings.printer_type)?;
        let jobs = Self::encode_all(settings, bitmap)?;
        let count = jobs.len();

        info!(
            "Printing {}x{} on '{}' in {} chunk(s)",
            bitmap.width(),
            bitmap.height(),
            printer.name(),
            count
        );

        if printer.prints_bitmap() {
            let data = jobs.into_iter().map(|(_, buf)| buf).collect::<Vec<_>>().concat();
            return printer.print(&settings.printer_endpoint, Some(bitmap), &data);
        }

        let delay = Duration::from_millis(settings.commands.split_delay);
        for (i, (chunk, buf)) in jobs.iter().enumerate() {
            debug!("Chunk {}/{}: {} bytes", i + 1, count, buf.len());
            printer.print(&settings.printer_endpoint, Some(chunk), buf)?;

            if i + 1 < count && !delay.is_zero() {
                thread::sleep(delay);
            }
        }
        Ok(())
    }

    /// Render `html` at the printer width and print it.
    pub fn print_html(&self, settings: &Settings, renderer: &dyn Renderer, html: &str) -> Result<()> {
        settings.validate()?;
        // Fail before rendering if the printer doesn't exist
        self.registry.get(&settings.printer_type)?;

        let bitmap = renderer.render(html, settings.printer_width)?;
        self.print(settings, &bitmap)
    }

    /// Send a stand-alone command such as a cut.
    pub fn send_command(&self, settings: &Settings, command: PrinterCommand) -> Result<()> {
        info!("Sending {:?} to '{}'", command, settings.printer_type);
        self.print_raw(settings, &command.to_bytes())
    }

    /// Forward an already encoded buffer to the configured printer.
    pub fn print_raw(&self, settings: &Settings, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(PrintError::Config("nothing to print".into()));
        }
        let printer = self.registry.get(&settings.printer_type)?;
        debug!("Raw job of {} bytes to '{}'", data.len(), printer.name());
        printer.print(&settings.printer_endpoint, None, data)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::Printer;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    const BLACK: [u8; 4] = [0, 0, 0, 255];

    /// Records every call.
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(String, Option<(u32, u32)>, Vec<u8>)>>,
        image: bool,
    }

    impl Printer for Recorder {
        fn name(&self) -> &str {
            "Recorder"
        }

        fn description(&self) -> &str {
            "records jobs"
        }

        fn prints_bitmap(&self) -> bool {
            self.image
        }

        fn print(&self, endpoint: &str, bitmap: Option<&Bitmap>, data: &[u8]) -> Result<()> {
            self.calls.lock().unwrap().push((
                endpoint.to_string(),
                bitmap.map(|b| (b.width(), b.height())),
                data.to_vec(),
            ));
            Ok(())
        }
    }

    fn setup() -> (Dispatcher, Arc<Recorder>, Settings) {
        setup_with(Recorder::default())
    }

    fn setup_with(recorder: Recorder) -> (Dispatcher, Arc<Recorder>, Settings) {
        let recorder = Arc::new(recorder);
        let mut registry = PrinterRegistry::new();
        registry.register(recorder.clone());

        let settings = Settings {
            printer_type: "Recorder".into(),
            printer_endpoint: "ep".into(),
            ..Settings::default()
        };
        (Dispatcher::new(registry), recorder, settings)
    }

    #[test]
    fn test_unknown_printer_calls_nothing() {
        let (dispatcher, recorder, mut settings) = setup();
        settings.printer_type = "Nope".into();
        let bitmap = Bitmap::filled(64, 8, BLACK).unwrap();

        let err = dispatcher.print(&settings, &bitmap).unwrap_err();
        assert!(matches!(err, PrintError::PrinterNotFound(_)));
        assert!(recorder.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_narrow_printer_rejected() {
        let (dispatcher, recorder, mut settings) = setup();
        settings.printer_width = 40;
        let bitmap = Bitmap::filled(40, 8, BLACK).unwrap();

        assert!(matches!(
            dispatcher.print(&settings, &bitmap),
            Err(PrintError::Config(_))
        ));
        assert!(recorder.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_small_split_height_rejected() {
        let (dispatcher, _, mut settings) = setup();
        settings.commands.split_printing = true;
        settings.commands.split_height = 50;
        let bitmap = Bitmap::filled(64, 300, BLACK).unwrap();

        assert!(matches!(
            dispatcher.print(&settings, &bitmap),
            Err(PrintError::Config(_))
        ));
    }

    #[test]
    fn test_small_split_height_ignored_for_short_image() {
        let (dispatcher, recorder, mut settings) = setup();
        settings.commands.split_printing = true;
        settings.commands.split_height = 50;
        let bitmap = Bitmap::filled(64, 40, BLACK).unwrap();

        dispatcher.print(&settings, &bitmap).unwrap();
        assert_eq!(recorder.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_image_backend_gets_whole_bitmap_when_splitting() {
        let (dispatcher, recorder, mut settings) = setup_with(Recorder {
            image: true,
            ..Recorder::default()
        });
        settings.commands.cut = true;
        settings.commands.split_printing = true;
        settings.commands.split_height = 100;
        let bitmap = Bitmap::filled(64, 250, BLACK).unwrap();

        dispatcher.print(&settings, &bitmap).unwrap();

        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, Some((64, 250)));
        let expected = dispatcher.build_commands(&settings, &bitmap).unwrap().concat();
        assert_eq!(calls[0].2, expected);
    }

    #[test]
    fn test_single_chunk_sequencing() {
        let (dispatcher, _, mut settings) = setup();
        settings.commands.explicit_init = true;
        settings.commands.force_standard_mode = true;
        settings.commands.lines_before = 2;
        settings.commands.lines_after = 1;
        settings.commands.cut = true;
        let bitmap = Bitmap::filled(8, 1, BLACK).unwrap();

        let bufs = dispatcher.build_commands(&settings, &bitmap).unwrap();
        assert_eq!(bufs.len(), 1);

        let mut expected = vec![0x1B, 0x40, 0x0A, 0x1B, 0x53, 0x0A, 0x0A, 0x0A];
        expected.extend([0x1D, 0x76, 0x30, 0x30, 0x01, 0x00, 0x01, 0x00, 0xFF]);
        expected.extend([0x0A; 6]);
        expected.extend([0x1B, 0x6D, 0x0A]);
        assert_eq!(bufs[0], expected);
    }

    #[test]
    fn test_defaults_have_no_prefix_and_five_feeds() {
        let (dispatcher, _, settings) = setup();
        let bitmap = Bitmap::filled(8, 1, BLACK).unwrap();

        let bufs = dispatcher.build_commands(&settings, &bitmap).unwrap();
        let mut expected = vec![0x1D, 0x76, 0x30, 0x30, 0x01, 0x00, 0x01, 0x00, 0xFF];
        expected.extend([0x0A; 5]);
        assert_eq!(bufs[0], expected);
    }

    #[test]
    fn test_split_printing_frames_first_and_last() {
        let (dispatcher, recorder, mut settings) = setup();
        settings.commands.explicit_init = true;
        settings.commands.cut = true;
        settings.commands.split_printing = true;
        settings.commands.split_height = 100;
        settings.commands.split_delay = 1;
        let bitmap = Bitmap::filled(16, 250, BLACK).unwrap();

        dispatcher.print(&settings, &bitmap).unwrap();

        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        let heights: Vec<_> = calls.iter().map(|c| c.1.unwrap().1).collect();
        assert_eq!(heights, vec![100, 100, 50]);

        // init only on the first chunk
        assert_eq!(&calls[0].2[..3], &[0x1B, 0x40, 0x0A]);
        assert_eq!(&calls[1].2[..4], &[0x1D, 0x76, 0x30, 0x30]);
        // cut only on the last chunk
        assert!(calls[2].2.ends_with(&[0x1B, 0x6D, 0x0A]));
        assert!(calls[1].2.ends_with(&[0xFF]));
        assert!(calls.iter().all(|c| c.0 == "ep"));
    }

    #[test]
    fn test_split_not_needed_for_short_image() {
        let (dispatcher, _, mut settings) = setup();
        settings.commands.split_printing = true;
        settings.commands.split_height = 100;
        let bitmap = Bitmap::filled(16, 100, BLACK).unwrap();

        assert_eq!(dispatcher.build_commands(&settings, &bitmap).unwrap().len(), 1);
    }

    #[test]
    fn test_esc_star_mode() {
        let (dispatcher, _, mut settings) = setup();
        settings.commands.use_esc_star = true;
        let bitmap = Bitmap::filled(8, 24, BLACK).unwrap();

        let bufs = dispatcher.build_commands(&settings, &bitmap).unwrap();
        assert_eq!(&bufs[0][..3], &[0x1B, 0x33, 24]);
        assert_eq!(&bufs[0][3..8], &[0x1B, 0x2A, 33, 8, 0]);
    }

    #[test]
    fn test_send_command_has_no_bitmap() {
        let (dispatcher, recorder, settings) = setup();
        dispatcher
            .send_command(&settings, PrinterCommand::Drawer2)
            .unwrap();

        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls[0].1, None);
        assert_eq!(calls[0].2, vec![0x1B, 0x70, 0x01, 0x02, 0x05]);
    }

    #[test]
    fn test_print_raw_forwards_verbatim() {
        let (dispatcher, recorder, settings) = setup();
        dispatcher.print_raw(&settings, &[1, 2, 3]).unwrap();
        assert_eq!(recorder.calls.lock().unwrap()[0].2, vec![1, 2, 3]);

        assert!(matches!(
            dispatcher.print_raw(&settings, &[]),
            Err(PrintError::Config(_))
        ));
    }

    #[test]
    fn test_print_html_uses_printer_width() {
        let (dispatcher, recorder, mut settings) = setup();
        settings.printer_width = 96;
        let renderer = |html: &str, width: u32| {
            assert_eq!(html, "<b>hi</b>");
            Bitmap::filled(width, 4, BLACK)
        };

        dispatcher.print_html(&settings, &renderer, "<b>hi</b>").unwrap();
        assert_eq!(recorder.calls.lock().unwrap()[0].1, Some((96, 4)));
    }

    #[test]
    fn test_render_error_passes_through() {
        let (dispatcher, recorder, settings) = setup();
        let renderer =
            |_: &str, _: u32| -> Result<Bitmap> { Err(PrintError::Render("no engine".into())) };

        let err = dispatcher.print_html(&settings, &renderer, "x").unwrap_err();
        assert!(matches!(err, PrintError::Render(ref m) if m == "no engine"));
        assert!(recorder.calls.lock().unwrap().is_empty());
    }
}

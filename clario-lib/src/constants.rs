// Protocol constants for the CLARIOstar serial link

use std::time::Duration;

/// Start-of-text byte opening every frame
pub const STX: u8 = 0x02;

/// Fixed marker closing the frame header
pub const HEADER_MARKER: u8 = 0x0c;

/// Carriage return terminating every frame
pub const CR: u8 = 0x0d;

/// STX, u16 length, marker
pub const HEADER_SIZE: usize = 4;

/// u16 checksum plus terminator
pub const TRAILER_SIZE: usize = 3;

/// Smallest declared frame length: header and trailer around an empty payload
pub const MIN_FRAME_SIZE: usize = HEADER_SIZE + TRAILER_SIZE;

/// Deadline applied to each of the header and body reads
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Sleep between status queries while waiting for the reader
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Device node created for the reader's FTDI adapter
pub const DEFAULT_PORT: &str = "/dev/clario";

/// The reader talks at a non-standard rate
pub const DEFAULT_BAUD_RATE: u32 = 125_000;

// --- Fixed command payloads ---

/// Moves the plate under the optics and checks that one is loaded
pub const CMD_INIT: &[u8] = &[0x01, 0x00, 0x00, 0x10, 0x02, 0x00];
pub const CMD_STATUS: &[u8] = &[0x80, 0x00];
pub const CMD_OPEN: &[u8] = &[0x03, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00];
pub const CMD_CLOSE: &[u8] = &[0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
pub const CMD_GET_DATA: &[u8] = &[0x05, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

// --- Status response ---

/// Status responses are always 17 bytes
pub const STATUS_RESPONSE_SIZE: usize = 17;

/// Leading status bytes that carry single-bit flags
pub const STATUS_FLAG_BYTES: usize = 5;

// --- Data responses ---

/// Offset of the schema byte in a data response
pub const SCHEMA_OFFSET: usize = 6;

pub const SCHEMA_DISCRETE_ABS: u8 = 0x29;
pub const SCHEMA_FLUORESCENCE: u8 = 0x21;

/// Known header fields of every data response fit in the first 34 bytes
pub const DATA_HEADER_SIZE: usize = 34;

/// Absorbance samples start after two more unknown bytes
pub const ABS_SAMPLES_OFFSET: usize = 36;

// --- Run command building blocks ---

/// Leading tag of the plate block
pub const PLATE_TAG: u8 = 0x04;

/// Encoded plate block size: tag, 6 u16 fields, cols, rows, bitmap, mode
pub const PLATE_BLOCK_SIZE: usize = 64;

/// Well selection bitmap size (384 wells)
pub const WELL_MASK_SIZE: usize = 48;

/// Always zero, offsets 65..68 of every run command
pub const RUN_PAD: [u8; 3] = [0x00; 3];

/// Unknown, follows the shaker block in every run command
pub const OPTICS_SEPARATOR: [u8; 4] = [0x27, 0x0F, 0x27, 0x0F];

/// Optics mode byte used by absorbance runs
pub const ABS_OPTICS_MODE: u8 = 0x02;

/// Precedes the absorbance wavelength list
pub const ABS_WAVELENGTH_TAG: u8 = 0x19;

/// Unknown, between the wavelength list and the pause field
pub const ABS_UNKNOWN_BLOCK_A: [u8; 13] = [
    0x00, 0x00, 0x00, 0x64, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x64, 0x00,
];

/// Unknown, between the pause field and the flash count
pub const ABS_UNKNOWN_BLOCK_B: [u8; 11] = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01];

/// Unknown absorbance trailer
pub const ABS_TRAILER: [u8; 4] = [0x00, 0x01, 0x00, 0x00];

/// Precedes the orbital averaging parameters
pub const FL_ORBITAL_TAG: u8 = 0x03;

/// Unknown, after the focal height. Byte 2 looks like a multichromat count.
pub const FL_UNKNOWN_BLOCK_A: [u8; 9] = [0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0c];

/// Unknown, after the emission window; differs for filter based reads
pub const FL_UNKNOWN_BLOCK_B: [u8; 4] = [0x00, 0x04, 0x00, 0x03];

/// Unknown, between the pause field and the flash count
pub const FL_UNKNOWN_BLOCK_C: [u8; 12] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01,
];

/// Unknown fluorescence trailer
pub const FL_TRAILER: [u8; 4] = [0x00, 0x4b, 0x00, 0x00];

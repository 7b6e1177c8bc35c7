#![no_main]

use end_use_balance::output::Output;
use end_use_balance::{run_balance, BalanceConfig};
use libfuzzer_sys::fuzz_target;
use std::io;
use std::io::{BufReader, Cursor, Write};

const MODEL_CONTEXT: &str = r#"{
    "Zones": [{"Name": "Zone 1"}],
    "Surfaces": [{"Name": "Wall 1", "SurfaceType": "Wall", "OutsideBoundaryCondition": "Outdoors", "ZoneName": "Zone 1"}],
    "SubSurfaces": [{"Name": "Window 1", "BuildingSurfaceName": "Wall 1"}]
}"#;

fuzz_target!(|data: &[u8]| {
    let _run = run_balance(
        BufReader::new(Cursor::new(data)),
        None::<&[u8]>,
        MODEL_CONTEXT.as_bytes(),
        &BalanceConfig::default(),
        100.,
        true,
        SinkOutput::default(),
    );
});

/// An output that goes to nowhere/ a "sink"/ /dev/null.
#[derive(Debug, Default)]
pub struct SinkOutput;

impl Output for SinkOutput {
    fn writer_for_location_key(&self, _location_key: &str) -> anyhow::Result<impl Write> {
        Ok(io::sink())
    }

    fn is_noop(&self) -> bool {
        // make the output pretend it's a no-op so fuzzing exercises code that calls it
        false
    }
}

use aces_frame::{compute_parity, SPAN_LEN};

use crate::cmd::{parse_hex, ParityArgs};
use crate::exit::{frame_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_parity, OutputFormat, ParityRow};

pub fn run(args: ParityArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = parse_hex(&args.hex)?;
    let (data, carried) = if args.verify {
        // n spans of data followed by n parity bytes
        if bytes.is_empty() || bytes.len() % (SPAN_LEN + 1) != 0 {
            return Err(CliError::new(
                DATA_INVALID,
                format!(
                    "{} bytes is not a whole number of {SPAN_LEN}-byte spans plus parity",
                    bytes.len()
                ),
            ));
        }
        bytes.split_at(bytes.len() / (SPAN_LEN + 1) * SPAN_LEN)
    } else {
        if bytes.is_empty() || bytes.len() % SPAN_LEN != 0 {
            return Err(CliError::new(
                DATA_INVALID,
                format!("{} bytes is not a whole number of {SPAN_LEN}-byte spans", bytes.len()),
            ));
        }
        (bytes.as_slice(), &[][..])
    };

    let mut rows = Vec::with_capacity(data.len() / SPAN_LEN);
    for (index, start) in (0..data.len()).step_by(SPAN_LEN).enumerate() {
        let parity = compute_parity(data, start).map_err(|err| frame_error("parity", err))?;
        rows.push(ParityRow {
            offset: start,
            span: hex::encode(&data[start..start + SPAN_LEN]),
            parity,
            carried: carried.get(index).copied(),
        });
    }
    print_parity(&rows, format);

    let mismatched: Vec<usize> = rows
        .iter()
        .enumerate()
        .filter(|(_, row)| row.carried.is_some_and(|c| c != row.parity))
        .map(|(index, _)| index)
        .collect();
    if !mismatched.is_empty() {
        return Err(CliError::new(
            DATA_INVALID,
            format!("parity mismatch in span(s) {mismatched:?}"),
        ));
    }
    Ok(SUCCESS)
}

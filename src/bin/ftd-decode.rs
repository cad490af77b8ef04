use anyhow::Context;
use fieldtester::codec::{decode_uplink, is_degraded, process};
use std::env;

fn parse_hex(input: &str) -> anyhow::Result<Vec<u8>> {
    let input = input.trim();
    let digits = input.strip_prefix("0x").unwrap_or(input);
    hex::decode(digits).with_context(|| format!("invalid hex uplink '{}'", input))
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <hex_uplink> [port] [sequence_id]", args[0]);
        eprintln!("\nDecodes a 10-byte field tester uplink and prints the downlink");
        eprintln!("answered for an empty gateway list. port defaults to 1, sequence_id to 0.");
        std::process::exit(1);
    }

    let bytes = parse_hex(&args[1])?;
    let port: u32 = match args.get(2) {
        Some(p) => p.parse()?,
        None => 1,
    };
    let sequence_id: u64 = match args.get(3) {
        Some(s) => s.parse()?,
        None => 0,
    };

    let fix = decode_uplink(&bytes)?;

    println!("Latitude:   {:.7}", fix.latitude);
    println!("Longitude:  {:.7}", fix.longitude);
    println!("Altitude:   {} m", fix.altitude_m);
    println!("HDOP:       {:.1}", fix.hdop);
    println!("Satellites: {}", fix.satellites);
    println!("Accuracy:   {:.2} m", fix.accuracy_m());
    println!("Degraded:   {}", is_degraded(&fix));

    let downlink = process(&fix, port, sequence_id, &[])?;
    println!("\nDownlink on port {}: {}", downlink.f_port, downlink.payload.to_hex());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        let expected = vec![0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x03, 0xE8, 0x0F, 0x08];
        assert_eq!(parse_hex("00010203040503e80f08").unwrap(), expected);
        assert_eq!(parse_hex(" 0x00010203040503E80F08\n").unwrap(), expected);

        assert!(parse_hex("0x0x00010203040503e80f08").is_err());
        assert!(parse_hex("0001020").is_err());
        assert!(parse_hex("zz").is_err());
        assert!(parse_hex("ü0").is_err());
    }

    #[test]
    fn test_hex_uplink_to_downlink() {
        let bytes = parse_hex("0x00010203040503e80f08").unwrap();
        let fix = decode_uplink(&bytes).unwrap();
        assert!(!is_degraded(&fix));

        let downlink = process(&fix, 1, 0, &[]).unwrap();
        assert_eq!(downlink.f_port, 2);
        assert_eq!(downlink.payload.to_hex(), "009000000000");
    }
}

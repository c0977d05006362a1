//! Two sessions talking over an in-memory wire, with some line noise thrown in.
//! Run with `RUST_LOG=debug cargo run --features demo`.

use std::time::Instant;

use rs485_nonblocking::{Loopback, Session};

fn main() {
    env_logger::init();

    let epoch = Instant::now();
    let clock = move || epoch.elapsed().as_millis() as u64;

    let mut master = Session::<Loopback, _, _>::new(None, Some(Loopback::new()), clock);
    let mut slave = Session::<_, Loopback, _>::new(Some(Loopback::new()), None, clock);
    if let Err(e) = slave.start(64) {
        eprintln!("can't start receiver: {e}");
        return;
    }

    let messages: [&[u8]; 3] = [b"Hello World!\n", b"status?", b"\x00\x01\x02\x03"];
    for msg in messages {
        if let Err(e) = master.send(msg) {
            eprintln!("send failed: {e}");
            continue;
        }
        if let (Some(wire), Some(rx)) = (master.tx_mut(), slave.rx_mut()) {
            // Garbage before the frame is ignored
            rx.extend(&[0xFF, 0x00]);
            wire.transfer_to(rx);
        }
    }

    // A frame that dies halfway
    if let Some(rx) = slave.rx_mut() {
        rx.extend(&[0x02, 0x4B, 0x44]);
    }

    while slave.poll() {
        if let Some(data) = slave.packet_data() {
            println!("received {:02x?}", data);
        }
        slave.reset();
    }

    println!(
        "errors: {} ({:?}), frame in progress: {}",
        slave.error_count(),
        slave.error_counts(),
        slave.is_frame_started()
    );
}

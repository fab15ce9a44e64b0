// CPU timing and boundary-behavior tests
//
// Cycle counts are measured fetch-to-fetch: the distance between the CPU
// latching one instruction and latching the next equals the first
// instruction's cycle count.

mod common;

use common::{run_to_fetch, run_to_halt, ProgramBuilder};

#[test]
fn test_implied_nop_is_two_cycles() {
    // $8000: NOP; $8001: NOP (the sled provides them).
    let mut m = ProgramBuilder::new().reset_vector(0x8000).load(0);
    let start = run_to_fetch(&mut m, 0x8000, 1_000);
    let end = run_to_fetch(&mut m, 0x8001, 1_000);
    assert_eq!(end - start, 2);
}

#[test]
fn test_rmw_zero_page_indexed_is_six_cycles() {
    // LDX #$05; INC $55,X with $5A preloaded to $7F.
    let mut m = ProgramBuilder::new()
        .at(
            0x8000,
            &[
                0xA2, 0x05, // LDX #$05
                0xF6, 0x55, // INC $55,X
                0x02, // KIL
            ],
        )
        .reset_vector(0x8000)
        .load(0);
    m.bus_write(0x005A, 0x7F);

    let start = run_to_fetch(&mut m, 0x8002, 1_000);
    let end = run_to_fetch(&mut m, 0x8004, 1_000);
    assert_eq!(end - start, 6, "INC zp,X takes 6 cycles");

    run_to_halt(&mut m, 100);
    assert_eq!(m.ram()[0x5A], 0x80);
    assert!(!m.cpu.flag_z);
    assert!(m.cpu.flag_n);
}

#[test]
fn test_indirect_jmp_page_wrap_bug() {
    // JMP ($02FF): low byte from $02FF, high byte from $0200.
    let mut m = ProgramBuilder::new()
        .at(0x8000, &[0x6C, 0xFF, 0x02]) // JMP ($02FF)
        .reset_vector(0x8000)
        .load(0);
    m.bus_write(0x02FF, 0x34);
    m.bus_write(0x0300, 0x99); // would be used without the bug
    m.bus_write(0x0200, 0x12);
    // Park a KIL at the buggy target ($1234 mirrors into RAM).
    m.bus_write(0x1234, 0x02);

    run_to_halt(&mut m, 1_000);
    assert_eq!(m.cpu.instruction_pc, 0x1234);
}

#[test]
fn test_branch_not_taken_is_two_cycles() {
    // LDX #$01 clears Z; BEQ falls through.
    let mut m = ProgramBuilder::new()
        .at(
            0x8000,
            &[
                0xA2, 0x01, // LDX #$01
                0xF0, 0x10, // BEQ +$10 (not taken)
                0xEA, // NOP
            ],
        )
        .reset_vector(0x8000)
        .load(0);

    let start = run_to_fetch(&mut m, 0x8002, 1_000);
    let end = run_to_fetch(&mut m, 0x8004, 1_000);
    assert_eq!(end - start, 2);
}

#[test]
fn test_branch_taken_same_page_is_three_cycles() {
    // LDX #$01 clears Z; BNE jumps forward within the page.
    let mut m = ProgramBuilder::new()
        .at(
            0x8000,
            &[
                0xA2, 0x01, // LDX #$01
                0xD0, 0x10, // BNE +$10 (taken)
            ],
        )
        .reset_vector(0x8000)
        .load(0);

    let start = run_to_fetch(&mut m, 0x8002, 1_000);
    let end = run_to_fetch(&mut m, 0x8014, 1_000);
    assert_eq!(end - start, 3);
}

#[test]
fn test_branch_taken_page_cross_is_four_cycles() {
    // BNE at $80FB: next PC is $80FD, offset $10 crosses into $810D.
    let mut m = ProgramBuilder::new()
        .at(0x8000, &[0xA2, 0x01]) // LDX #$01
        .at(0x8002, &[0x4C, 0xFB, 0x80]) // JMP $80FB
        .at(0x80FB, &[0xD0, 0x10]) // BNE +$10 (taken, crosses)
        .reset_vector(0x8000)
        .load(0);

    let start = run_to_fetch(&mut m, 0x80FB, 2_000);
    let end = run_to_fetch(&mut m, 0x810D, 2_000);
    assert_eq!(end - start, 4);
}

#[test]
fn test_indexed_read_page_cross_penalty() {
    // LDA $80FF,X with X=1 crosses into $8100: 5 cycles instead of 4.
    let mut m = ProgramBuilder::new()
        .at(
            0x8000,
            &[
                0xA2, 0x01, // LDX #$01
                0xBD, 0xFF, 0x80, // LDA $80FF,X (crosses)
                0xBD, 0x00, 0x80, // LDA $8000,X (same page)
                0x02, // KIL
            ],
        )
        .reset_vector(0x8000)
        .load(0);

    let first = run_to_fetch(&mut m, 0x8002, 1_000);
    let second = run_to_fetch(&mut m, 0x8005, 1_000);
    let third = run_to_fetch(&mut m, 0x8008, 1_000);
    assert_eq!(second - first, 5, "page-crossing read pays a dummy cycle");
    assert_eq!(third - second, 4, "same-page read does not");
}

#[test]
fn test_indexed_rmw_always_pays_penalty() {
    // INC $0200,X with X=0: no page cross, still 7 cycles.
    let mut m = ProgramBuilder::new()
        .at(
            0x8000,
            &[
                0xA2, 0x00, // LDX #$00
                0xFE, 0x00, 0x02, // INC $0200,X
                0x02, // KIL
            ],
        )
        .reset_vector(0x8000)
        .load(0);

    let start = run_to_fetch(&mut m, 0x8002, 1_000);
    let end = run_to_fetch(&mut m, 0x8005, 1_000);
    assert_eq!(end - start, 7);
}

#[test]
fn test_adc_overflow_boundary() {
    let mut m = ProgramBuilder::new()
        .at(
            0x8000,
            &[
                0x18, // CLC
                0xA9, 0x7F, // LDA #$7F
                0x69, 0x01, // ADC #$01
                0x02, // KIL
            ],
        )
        .reset_vector(0x8000)
        .load(0);

    run_to_halt(&mut m, 1_000);
    assert_eq!(m.cpu.a, 0x80);
    assert!(m.cpu.flag_v);
    assert!(m.cpu.flag_n);
    assert!(!m.cpu.flag_z);
    assert!(!m.cpu.flag_c);
}

#[test]
fn test_php_plp_round_trip_forces_b_and_u() {
    let mut m = ProgramBuilder::new()
        .at(
            0x8000,
            &[
                0x38, // SEC
                0x08, // PHP
                0x18, // CLC
                0x28, // PLP
                0x02, // KIL
            ],
        )
        .reset_vector(0x8000)
        .load(0);

    run_to_halt(&mut m, 1_000);
    assert!(m.cpu.flag_c, "carry restored by PLP");
    assert!(m.cpu.flag_b, "B reads back set");
    // The pushed byte had U and B set alongside the flags.
    let pushed = m.ram()[0x01FD & 0x07FF];
    assert_eq!(pushed & 0x30, 0x30);
}

#[test]
fn test_stack_wraps_at_page_boundary() {
    // Pull more than was pushed: SP wraps through $FF.
    let mut m = ProgramBuilder::new()
        .at(
            0x8000,
            &[
                0xA2, 0x00, // LDX #$00
                0x9A, // TXS (SP = 0)
                0x68, // PLA (SP wraps to 1)
                0x02, // KIL
            ],
        )
        .reset_vector(0x8000)
        .load(0);

    run_to_halt(&mut m, 1_000);
    assert_eq!(m.cpu.sp, 0x01);
}

#[test]
fn test_kil_halts_fetching_but_frames_continue() {
    let mut m = ProgramBuilder::new()
        .at(0x8000, &[0x02]) // KIL
        .reset_vector(0x8000)
        .load(0);

    m.run_until_vertical_blank();
    assert!(m.cpu.halted);
    let pc = m.cpu.pc;

    // The machine still reaches the next vblank with the CPU jammed.
    m.run_until_vertical_blank();
    assert_eq!(m.ppu.vblank_count, 2);
    assert_eq!(m.cpu.pc, pc);
}

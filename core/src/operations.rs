use crate::config::EdgePolicy;
use crate::constants::{DISPLAY_HEIGHT, DISPLAY_WIDTH, GLYPH_HEIGHT, STACK_SIZE, VF};
use crate::error::{Error, Result};
use crate::instruction::Instruction;
use crate::state::State;

/// Applies `instruction` to `state`, returning the successor state.
///
/// The successor is only returned if its pc can be fetched from, so a caller that swaps it in
/// never ends up pointing outside of memory.
pub fn execute(instruction: Instruction, state: &State, edge_policy: EdgePolicy) -> Result<State> {
    use Instruction::*;

    let successor = match instruction {
        Cls => cls(state),
        Ret => ret(state)?,
        Jp { addr } => jump(state, addr),
        Call { addr } => call(state, addr)?,
        SeByte { x, kk } => skip_if(state, state.v[x as usize] == kk),
        SneByte { x, kk } => skip_if(state, state.v[x as usize] != kk),
        SeReg { x, y } => skip_if(state, state.v[x as usize] == state.v[y as usize]),
        LdByte { x, kk } => load(state, x, kk),
        AddByte { x, kk } => add(state, x, kk),
        LdReg { x, y } => mv(state, x, y),
        Or { x, y } => or(state, x, y),
        And { x, y } => and(state, x, y),
        Xor { x, y } => xor(state, x, y),
        AddReg { x, y } => add_reg(state, x, y),
        Sub { x, y } => sub(state, x, y),
        Shr { x, .. } => shr(state, x),
        Subn { x, y } => subn(state, x, y),
        Shl { x, .. } => shl(state, x),
        SneReg { x, y } => skip_if(state, state.v[x as usize] != state.v[y as usize]),
        LdI { addr } => loadi(state, addr),
        JpV0 { addr } => jump(state, addr + u16::from(state.v[0x0])),
        Rnd { x, kk } => rand(state, x, kk),
        Drw { x, y, n } => draw(state, x, y, n, edge_policy)?,
        Skp { x } => skip_if(state, state.pressed_keys[key_in(state, x)]),
        Sknp { x } => skip_if(state, !state.pressed_keys[key_in(state, x)]),
        LdVxDt { x } => load(state, x, state.delay_timer),
        LdVxKey { x } => await_key(state, x),
        LdDtVx { x } => State {
            delay_timer: state.v[x as usize],
            ..next(state)
        },
        LdStVx { x } => State {
            sound_timer: state.v[x as usize],
            ..next(state)
        },
        AddI { x } => loadi(state, state.i.wrapping_add(u16::from(state.v[x as usize]))),
        LdFont { x } => loadi(state, u16::from(state.v[x as usize]) * GLYPH_HEIGHT),
        LdBcd { x } => bcd(state, x)?,
        Store { x } => stor(state, x)?,
        Load { x } => read(state, x)?,
    };
    successor.check_pc()?;
    Ok(successor)
}

/// Completes a pending Fx0A if a key is down; otherwise nothing changes
pub fn poll_key(state: &State, x: u8) -> State {
    match pressed_key(state) {
        Some(key) => {
            let mut v = state.v;
            v[x as usize] = key;
            State {
                v,
                awaiting_key: None,
                ..next(state)
            }
        }
        None => *state,
    }
}

/// The highest numbered key currently down
fn pressed_key(state: &State) -> Option<u8> {
    state.pressed_keys.iter().rposition(|&down| down).map(|key| key as u8)
}

/// Vx holds a key index; only its low nibble names a key
fn key_in(state: &State, x: u8) -> usize {
    (state.v[x as usize] & 0xF) as usize
}

/// pc += 2
fn next(state: &State) -> State {
    State {
        pc: state.pc + 0x2,
        ..*state
    }
}

/// if condition then pc += 4 else pc += 2
fn skip_if(state: &State, condition: bool) -> State {
    let pc = if condition {
        state.pc + 0x4
    } else {
        state.pc + 0x2
    };
    State { pc, ..*state }
}

/// clear
fn cls(state: &State) -> State {
    State {
        frame_buffer: [[false; DISPLAY_WIDTH]; DISPLAY_HEIGHT],
        draw_flag: true,
        ..next(state)
    }
}

/// PC = STACK.pop()
fn ret(state: &State) -> Result<State> {
    if state.sp == 0 {
        return Err(Error::StackUnderflow { pc: state.pc });
    }
    Ok(State {
        pc: state.stack[state.sp as usize],
        sp: state.sp - 0x1,
        ..*state
    })
}

/// PC = addr
fn jump(state: &State, addr: u16) -> State {
    State { pc: addr, ..*state }
}

/// STACK.push(PC + 2); PC = addr
fn call(state: &State, addr: u16) -> Result<State> {
    let sp = state.sp as usize + 1;
    if sp >= STACK_SIZE {
        return Err(Error::StackOverflow { pc: state.pc });
    }
    let mut stack = state.stack;
    stack[sp] = state.pc + 0x2;
    Ok(State {
        pc: addr,
        sp: sp as u8,
        stack,
        ..*state
    })
}

/// Vx = kk
fn load(state: &State, x: u8, kk: u8) -> State {
    let mut v = state.v;
    v[x as usize] = kk;
    State { v, ..next(state) }
}

/// Vx += kk
/// Add kk to Vx; allow for overflow but implicitly drop it
fn add(state: &State, x: u8, kk: u8) -> State {
    let mut v = state.v;
    v[x as usize] = v[x as usize].wrapping_add(kk);
    State { v, ..next(state) }
}

/// Vx = Vy
fn mv(state: &State, x: u8, y: u8) -> State {
    load(state, x, state.v[y as usize])
}

/// Vx |= Vy
fn or(state: &State, x: u8, y: u8) -> State {
    load(state, x, state.v[x as usize] | state.v[y as usize])
}

/// Vx &= Vy
fn and(state: &State, x: u8, y: u8) -> State {
    load(state, x, state.v[x as usize] & state.v[y as usize])
}

/// Vx ^= Vy
fn xor(state: &State, x: u8, y: u8) -> State {
    load(state, x, state.v[x as usize] ^ state.v[y as usize])
}

/// Writes `res` to Vx and then `flag` to VF, so VF wins when x is F
fn with_flag(state: &State, x: u8, res: u8, flag: bool) -> State {
    let mut v = state.v;
    v[x as usize] = res;
    v[VF] = flag as u8;
    State { v, ..next(state) }
}

/// Vx += Vy; VF = carry
fn add_reg(state: &State, x: u8, y: u8) -> State {
    let (res, carry) = state.v[x as usize].overflowing_add(state.v[y as usize]);
    with_flag(state, x, res, carry)
}

/// Vx -= Vy; VF = Vx > Vy
fn sub(state: &State, x: u8, y: u8) -> State {
    let (vx, vy) = (state.v[x as usize], state.v[y as usize]);
    with_flag(state, x, vx.wrapping_sub(vy), vx > vy)
}

/// Vx >>= 1; VF = the bit shifted out
fn shr(state: &State, x: u8) -> State {
    let vx = state.v[x as usize];
    with_flag(state, x, vx >> 1, vx & 0x1 == 0x1)
}

/// Vx = Vy - Vx; VF = Vy > Vx
fn subn(state: &State, x: u8, y: u8) -> State {
    let (vx, vy) = (state.v[x as usize], state.v[y as usize]);
    with_flag(state, x, vy.wrapping_sub(vx), vy > vx)
}

/// Vx <<= 1; VF = the bit shifted out
fn shl(state: &State, x: u8) -> State {
    let vx = state.v[x as usize];
    with_flag(state, x, vx << 1, vx & 0x80 == 0x80)
}

/// I = addr
fn loadi(state: &State, i: u16) -> State {
    State { i, ..next(state) }
}

/// Vx = rand_byte & kk
fn rand(state: &State, x: u8, kk: u8) -> State {
    let rand_byte: u8 = rand::random();
    load(state, x, rand_byte & kk)
}

/// draw_sprite(x=Vx y=Vy size=n)
/// XORs a sprite from memory i..i+n at position x, y on the FrameBuffer.
/// Sets VF if any lit pixel gets erased
fn draw(state: &State, x: u8, y: u8, n: u8, edge_policy: EdgePolicy) -> Result<State> {
    let sprite = state.read(state.i, n as usize)?;
    let origin_x = state.v[x as usize] as usize;
    let origin_y = state.v[y as usize] as usize;
    let mut frame_buffer = state.frame_buffer;
    let mut collision = false;

    for (row, byte) in sprite.iter().enumerate() {
        for bit in 0..8 {
            if byte & (0x80 >> bit) == 0 {
                continue;
            }
            let (px, py) = edge_policy.place(origin_x + bit, origin_y + row);
            collision |= frame_buffer[py][px];
            frame_buffer[py][px] ^= true;
        }
    }

    let mut v = state.v;
    v[VF] = collision as u8;
    Ok(State {
        v,
        frame_buffer,
        draw_flag: true,
        ..next(state)
    })
}

/// Vx = first pressed key, or wait for one
fn await_key(state: &State, x: u8) -> State {
    match pressed_key(state) {
        Some(key) => load(state, x, key),
        None => State {
            awaiting_key: Some(x),
            ..*state
        },
    }
}

/// mem[I..I+3] = bcd(Vx)
fn bcd(state: &State, x: u8) -> Result<State> {
    let vx = state.v[x as usize];
    let range = state.range(state.i, 3)?;
    let mut memory = state.memory;
    memory[range].copy_from_slice(&[vx / 100, vx / 10 % 10, vx % 10]);
    Ok(State {
        memory,
        ..next(state)
    })
}

/// mem[I..=I+x] = V0..=Vx; I += x + 1
fn stor(state: &State, x: u8) -> Result<State> {
    let count = x as usize + 1;
    let range = state.range(state.i, count)?;
    let mut memory = state.memory;
    memory[range].copy_from_slice(&state.v[..count]);
    Ok(State {
        memory,
        i: state.i + count as u16,
        ..next(state)
    })
}

/// V0..=Vx = mem[I..=I+x]; I += x + 1
fn read(state: &State, x: u8) -> Result<State> {
    let count = x as usize + 1;
    let mut v = state.v;
    v[..count].copy_from_slice(state.read(state.i, count)?);
    Ok(State {
        v,
        i: state.i + count as u16,
        ..next(state)
    })
}

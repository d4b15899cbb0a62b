use gfx_hal::{format as f, pso};
use std::mem;

#[derive(Debug, Clone, Copy)]
#[allow(non_snake_case)]
pub struct Vertex {
    a_Pos: [f32; 2],
}

impl Vertex {
    pub fn buffer_desc() -> pso::VertexBufferDesc {
        pso::VertexBufferDesc {
            binding: 0,
            stride: mem::size_of::<Vertex>() as u32,
            rate: pso::VertexInputRate::Vertex,
        }
    }

    pub fn attributes() -> Vec<pso::AttributeDesc> {
        vec![pso::AttributeDesc {
            location: 0,
            binding: 0,
            element: pso::Element {
                format: f::Format::Rg32Sfloat,
                offset: 0,
            },
        }]
    }
}

pub const TRIANGLE: [Vertex; 3] = [
    Vertex {
        a_Pos: [-0.5, -0.5],
    },
    Vertex { a_Pos: [0.0, 0.5] },
    Vertex {
        a_Pos: [0.5, -0.5],
    },
];

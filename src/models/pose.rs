/// A buffer resource declared in the mod (`[ResourceX]` with `stride` and `filename`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub name: String,
    pub kind: String,
    pub filename: String,
    pub stride: u32,
}

impl Resource {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, filename: impl Into<String>, stride: u32) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            filename: filename.into(),
            stride,
        }
    }

    /// Compute-shader view of this resource, declared as a structured buffer.
    pub fn structured_view(&self) -> Self {
        Self::new(format!("{}CS", self.name), "StructuredBuffer", &self.filename, self.stride)
    }

    /// `[name]` declaration block
    pub fn declaration(&self) -> String {
        format!(
            "[{}]\ntype = {}\nstride = {}\nfilename = {}\n",
            self.name, self.kind, self.stride, self.filename
        )
    }
}

/// Resources of one character part correlated for the batched pose fix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelData {
    pub part_name: String,
    pub blend_resource: Resource,
    pub pos_resource: Resource,
    pub ref_draw_hash: String,
    pub ref_blend_hash: String,
    pub vertex_count: u32,
    pub blend_consumed: bool,
    pub draw_consumed: bool,
    pub res_consumed: bool,
}

impl ModelData {
    pub fn new(
        part_name: impl Into<String>,
        blend_resource: Resource,
        pos_resource: Resource,
        ref_draw_hash: impl Into<String>,
        ref_blend_hash: impl Into<String>,
        vertex_count: u32,
    ) -> Self {
        Self {
            part_name: part_name.into(),
            blend_resource,
            pos_resource,
            ref_draw_hash: ref_draw_hash.into(),
            ref_blend_hash: ref_blend_hash.into(),
            vertex_count,
            blend_consumed: false,
            draw_consumed: false,
            res_consumed: false,
        }
    }

    /// Name of the shared RW draw buffer for this part
    pub fn draw_resource_name(&self) -> String {
        let id = if self.part_name.is_empty() {
            &self.ref_draw_hash
        } else {
            &self.part_name
        };
        format!("Resource{id}DrawCS")
    }

    pub fn fully_consumed(&self) -> bool {
        self.blend_consumed && self.draw_consumed && self.res_consumed
    }
}

/// Blend override considered for the merge-mod variant of the pose fix.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandListCandidate {
    pub has_vb0: bool,
    /// Index of the referenced `[CommandList...]` section
    pub command_list: Option<usize>,
    pub draw_hash: String,
    pub blend_hash: String,
}

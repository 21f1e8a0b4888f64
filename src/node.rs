use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use num_traits::FromPrimitive;
use std::io::{Read, Write};

#[derive(Debug, Clone, Copy, PartialEq, FromPrimitive)]
enum Tag {
	Leaf = 0,
	Children = 1,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Split {
	pub value: f64,
	pub column: usize,
}

impl Split {
	pub fn serialize<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
		writer.write_f64::<BigEndian>(self.value)?;
		writer.write_u16::<BigEndian>(self.column as u16)?;

		Ok(())
	}

	pub fn deserialize<R: Read>(reader: &mut R) -> std::io::Result<Self> {
		let value = reader.read_f64::<BigEndian>()?;
		let column = reader.read_u16::<BigEndian>()? as usize;

		Ok(Self { value, column })
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
	/// Class distribution of the training rows that reached this leaf.
	Leaf(Vec<f64>),
	Children {
		left: Box<Node>,
		right: Box<Node>,
		split: Split,
	},
}

impl Node {
	pub fn predict_proba(&self, x: &[f64]) -> &[f64] {
		match self {
			Node::Leaf(distribution) => distribution,
			Node::Children { left, right, split } => {
				if x[split.column] <= split.value {
					left.predict_proba(x)
				} else {
					right.predict_proba(x)
				}
			},
		}
	}

	pub fn depth(&self) -> usize {
		match self {
			Node::Leaf(_) => 0,
			Node::Children { left, right, .. } => 1 + std::cmp::max(left.depth(), right.depth()),
		}
	}

	/// Rejects splits on columns past `features` and leaves that do not
	/// cover exactly `classes` classes.
	pub fn validate(&self, features: usize, classes: usize) -> std::io::Result<()> {
		match self {
			Node::Leaf(distribution) if distribution.len() != classes => Err(invalid_data(format!(
				"leaf has {} classes, expected {}",
				distribution.len(),
				classes,
			))),
			Node::Leaf(_) => Ok(()),
			Node::Children { split, .. } if split.column >= features => Err(invalid_data(format!(
				"split on column {} but there are {} features",
				split.column,
				features,
			))),
			Node::Children { left, right, .. } => {
				left.validate(features, classes)?;
				right.validate(features, classes)
			},
		}
	}

	pub fn serialize<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
		match self {
			Node::Leaf(distribution) => {
				writer.write_u16::<BigEndian>(Tag::Leaf as u16)?;
				write_values(writer, distribution)?;
			},
			Node::Children { left, right, split } => {
				writer.write_u16::<BigEndian>(Tag::Children as u16)?;
				split.serialize(writer)?;
				left.serialize(writer)?;
				right.serialize(writer)?;
			}
		}

		Ok(())
	}

	pub fn deserialize<R: Read>(reader: &mut R) -> std::io::Result<Self> {
		let tag = reader.read_u16::<BigEndian>()?;

		match Tag::from_u16(tag) {
			Some(Tag::Leaf) => Ok(Node::Leaf(read_values(reader)?)),
			Some(Tag::Children) => {
				let split = Split::deserialize(reader)?;
				let left = Box::new(Node::deserialize(reader)?);
				let right = Box::new(Node::deserialize(reader)?);

				Ok(Node::Children { split, left, right })
			},
			None => Err(invalid_data(format!("unknown node type {:?}", tag))),
		}
	}
}

pub fn invalid_data(message: String) -> std::io::Error {
	std::io::Error::new(std::io::ErrorKind::InvalidData, message)
}

/// Length-prefixed list of floats.
pub fn write_values<W: Write>(writer: &mut W, values: &[f64]) -> std::io::Result<()> {
	writer.write_u16::<BigEndian>(values.len() as u16)?;

	for &value in values {
		writer.write_f64::<BigEndian>(value)?;
	}

	Ok(())
}

pub fn read_values<R: Read>(reader: &mut R) -> std::io::Result<Vec<f64>> {
	let len = reader.read_u16::<BigEndian>()?;

	(0..len)
		.map(|_| reader.read_f64::<BigEndian>())
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn stump() -> Node {
		Node::Children {
			split: Split { value: 2.5, column: 1 },
			left: Box::new(Node::Leaf(vec![1.0, 0.0])),
			right: Box::new(Node::Leaf(vec![0.25, 0.75])),
		}
	}

	#[test]
	fn routes_on_threshold() {
		let node = stump();
		assert_eq!(node.predict_proba(&[9.0, 2.5]), &[1.0, 0.0]);
		assert_eq!(node.predict_proba(&[9.0, 2.6]), &[0.25, 0.75]);
		assert_eq!(node.depth(), 1);
	}

	#[test]
	fn survives_serialization() -> std::io::Result<()> {
		let node = stump();
		let mut buffer = Vec::new();
		node.serialize(&mut buffer)?;

		let restored = Node::deserialize(&mut buffer.as_slice())?;
		assert_eq!(restored, node);

		Ok(())
	}

	#[test]
	fn validate_checks_columns_and_classes() {
		let node = stump();

		assert!(node.validate(2, 2).is_ok());
		assert_eq!(node.validate(1, 2).unwrap_err().kind(), std::io::ErrorKind::InvalidData);
		assert_eq!(node.validate(2, 3).unwrap_err().kind(), std::io::ErrorKind::InvalidData);
	}

	#[test]
	fn rejects_unknown_tag() {
		let bytes = [0u8, 7];
		let err = Node::deserialize(&mut &bytes[..]).unwrap_err();
		assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
	}

	#[test]
	fn rejects_truncated_leaf() {
		let bytes = [0u8, 0, 0, 2, 0x3f, 0xf0];
		let err = Node::deserialize(&mut &bytes[..]).unwrap_err();
		assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
	}
}
